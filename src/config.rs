//! Configuration for khata.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (KHATA_HOME, KHATA_API_URL, KHATA_TOKEN)
//! 2. Config file (.khata/config.yaml)
//! 3. Defaults (~/.khata, http://localhost:8000)
//!
//! Config file discovery:
//! - Searches current directory and parents for .khata/config.yaml
//! - Relative paths in the config file are resolved against the .khata/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
/// The backend rejects anything shorter as "Audio too short"
pub const DEFAULT_MIN_CLIP_BYTES: usize = 100;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    /// Engine state directory (relative to .khata/)
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub capture: Option<CaptureConfig>,
    #[serde(default)]
    pub journal: Option<JournalConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureConfig {
    pub min_clip_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JournalConfig {
    pub enabled: Option<bool>,
    /// Journal file (relative to .khata/)
    pub path: Option<String>,
}

/// Backend connection settings
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to khata home (journal, state)
    pub home: PathBuf,
    pub api: ApiSettings,
    pub min_clip_bytes: usize,
    /// Journal file, `None` when disabled
    pub journal_path: Option<PathBuf>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".khata").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Environment overrides, read once per load
struct EnvOverrides {
    home: Option<String>,
    api_url: Option<String>,
    token: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            home: std::env::var("KHATA_HOME").ok(),
            api_url: std::env::var("KHATA_API_URL").ok(),
            token: std::env::var("KHATA_TOKEN").ok(),
        }
    }
}

/// Merge defaults, an optional config file and environment overrides
fn resolve(
    default_home: PathBuf,
    file: Option<(&Path, ConfigFile)>,
    env: EnvOverrides,
) -> ResolvedConfig {
    let (config_file, config) = match file {
        Some((path, config)) => (Some(path.to_path_buf()), Some(config)),
        None => (None, None),
    };
    // .khata/ directory, base for relative paths
    let khata_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf);

    let home = match (&env.home, config.as_ref().and_then(|c| c.home.as_ref()), &khata_dir) {
        (Some(env_home), _, _) => PathBuf::from(env_home),
        (None, Some(home), Some(dir)) => resolve_path(dir, home),
        _ => default_home,
    };

    let api_config = config.as_ref().and_then(|c| c.api.clone()).unwrap_or_default();
    let api = ApiSettings {
        base_url: env
            .api_url
            .or(api_config.base_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        token: env.token.or(api_config.token).filter(|t| !t.is_empty()),
        timeout_seconds: api_config.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
    };

    let min_clip_bytes = config
        .as_ref()
        .and_then(|c| c.capture.as_ref())
        .and_then(|c| c.min_clip_bytes)
        .unwrap_or(DEFAULT_MIN_CLIP_BYTES);

    let journal = config.as_ref().and_then(|c| c.journal.clone()).unwrap_or_default();
    let journal_path = if journal.enabled.unwrap_or(true) {
        Some(match (journal.path, &khata_dir) {
            (Some(path), Some(dir)) => resolve_path(dir, &path),
            _ => home.join("journal.jsonl"),
        })
    } else {
        None
    };

    ResolvedConfig {
        home,
        api,
        min_clip_bytes,
        journal_path,
        config_file,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".khata");

    let config_path = find_config_file();
    let file = match config_path {
        Some(ref path) => Some((path.as_path(), load_config_file(path)?)),
        None => None,
    };

    Ok(resolve(default_home, file, EnvOverrides::from_env()))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the khata home directory
pub fn khata_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}
