//! Command-line interface for khata.
//!
//! Provides commands for recording voice entries, managing categories and
//! parties, and inspecting the workflow journal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::adapters::{BackendClient, ReferenceService};
use crate::config;
use crate::domain::{ReferenceEntity, ReferenceKind};
use crate::journal::Journal;

pub mod voice;

/// khata - voice-driven expense and client-ledger entry
#[derive(Parser, Debug)]
#[command(name = "khata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record an entry from an audio clip and confirm it
    Voice(voice::VoiceArgs),

    /// Manage expense categories
    Categories {
        #[command(subcommand)]
        command: Option<CategoryCommands>,
    },

    /// Manage parties (clients)
    Parties {
        #[command(subcommand)]
        command: Option<PartyCommands>,
    },

    /// Show workflow journal events
    Journal {
        /// Maximum number of events to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only events of this workflow instance
        #[arg(short, long)]
        workflow: Option<String>,

        /// Report whether this commit key was recorded
        #[arg(long)]
        commit: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommands {
    /// List categories
    List,

    /// Add a category
    Add {
        /// Category name
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PartyCommands {
    /// List parties
    List,

    /// Add a party
    Add {
        /// Party name
        name: String,

        /// Phone number
        #[arg(long, default_value = "")]
        phone: String,

        /// Free-form notes
        #[arg(long, default_value = "")]
        notes: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Voice(args) => voice::execute(args).await,
            Commands::Categories { command } => {
                let client = backend()?;
                match command.unwrap_or(CategoryCommands::List) {
                    CategoryCommands::List => list_references(&client, ReferenceKind::Category).await,
                    CategoryCommands::Add { name } => {
                        let entity = client
                            .create_reference_entity(ReferenceKind::Category, &name)
                            .await?;
                        print_created(ReferenceKind::Category, &entity);
                        Ok(())
                    }
                }
            }
            Commands::Parties { command } => {
                let client = backend()?;
                match command.unwrap_or(PartyCommands::List) {
                    PartyCommands::List => list_references(&client, ReferenceKind::Party).await,
                    PartyCommands::Add { name, phone, notes } => {
                        let entity = client.create_party(&name, &phone, &notes).await?;
                        print_created(ReferenceKind::Party, &entity);
                        Ok(())
                    }
                }
            }
            Commands::Journal {
                limit,
                workflow,
                commit,
            } => execute_journal(limit, workflow, commit),
            Commands::Config => execute_config(),
        }
    }
}

fn backend() -> Result<BackendClient> {
    let config = config::config()?;
    BackendClient::from_settings(&config.api)
}

async fn list_references(client: &BackendClient, kind: ReferenceKind) -> Result<()> {
    let entities = client.list_reference_entities(kind).await?;

    if entities.is_empty() {
        println!("No {} entries yet.", kind);
        return Ok(());
    }

    println!("{:<38} NAME", "ID");
    println!("{}", "─".repeat(60));
    for entity in &entities {
        println!("{:<38} {}", entity.id, entity.name);
    }
    println!();
    println!("Total: {}", entities.len());
    Ok(())
}

fn print_created(kind: ReferenceKind, entity: &ReferenceEntity) {
    println!("✅ Added {} '{}' ({})", kind, entity.name, entity.id);
}

fn execute_journal(limit: usize, workflow: Option<String>, commit: Option<String>) -> Result<()> {
    let config = config::config()?;
    let Some(path) = config.journal_path.as_ref() else {
        println!("Journal is disabled in configuration.");
        return Ok(());
    };
    let journal = Journal::new(path);

    if let Some(key) = commit {
        if journal.is_committed(&key)? {
            println!("✓ Commit {} is recorded", key);
        } else {
            println!("✗ Commit {} not found", key);
        }
        return Ok(());
    }

    let events = match workflow {
        Some(id) => {
            let id = Uuid::parse_str(&id).context("Invalid workflow ID")?;
            journal.workflow_events(id)?
        }
        None => journal.recent(limit)?,
    };

    if events.is_empty() {
        println!("No journal events.");
        return Ok(());
    }

    for event in &events {
        println!(
            "{}  {}  {:<18} {} → {}  {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            &event.workflow_id.to_string()[..8],
            format!("{:?}", event.event_type),
            event.from,
            event.to,
            event.summary
        );
    }
    Ok(())
}

fn execute_config() -> Result<()> {
    let config = config::config()?;

    println!("Configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!(
        "Config file:   {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("Home:          {}", config.home.display());
    println!("API URL:       {}", config.api.base_url);
    println!(
        "Token:         {}",
        if config.api.token.is_some() { "set" } else { "not set" }
    );
    println!("Timeout:       {}s", config.api.timeout_seconds);
    println!("Min clip size: {} bytes", config.min_clip_bytes);
    println!(
        "Journal:       {}",
        config
            .journal_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "disabled".to_string())
    );
    Ok(())
}
