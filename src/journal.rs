//! Append-only workflow journal.
//!
//! Transitions are stored as newline-delimited JSON (JSONL) for easy
//! inspection. Appends take an exclusive file lock so two sessions can
//! share one journal.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use uuid::Uuid;

use crate::domain::{WorkflowEvent, WorkflowEventType};

/// File-based journal using JSONL format
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location ($KHATA_HOME/journal.jsonl)
    pub fn default_path() -> Result<PathBuf> {
        Ok(crate::config::khata_home()?.join("journal.jsonl"))
    }

    /// Open the journal at `path`, creating its directory
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create journal directory: {}", parent.display()))?;
        }
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event under an exclusive lock
    pub fn append(&self, event: &WorkflowEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        file.lock_exclusive()
            .context("Failed to acquire file lock on journal")?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        writeln!(file, "{}", json).context("Failed to write event")?;
        file.flush().context("Failed to flush event")?;

        // Lock is released when file is dropped
        Ok(())
    }

    /// Replay all events in order
    pub fn replay(&self) -> Result<Vec<WorkflowEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        let mut events = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: WorkflowEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse journal line: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// The last `limit` events, oldest first
    pub fn recent(&self, limit: usize) -> Result<Vec<WorkflowEvent>> {
        let events = self.replay()?;
        let skip = events.len().saturating_sub(limit);
        Ok(events.into_iter().skip(skip).collect())
    }

    /// Events of one workflow instance
    pub fn workflow_events(&self, workflow_id: Uuid) -> Result<Vec<WorkflowEvent>> {
        Ok(self
            .replay()?
            .into_iter()
            .filter(|e| e.workflow_id == workflow_id)
            .collect())
    }

    /// Whether a commit with this key was recorded
    pub fn is_committed(&self, commit_key: &str) -> Result<bool> {
        Ok(self.replay()?.iter().any(|e| {
            e.event_type == WorkflowEventType::Committed
                && e.commit_key.as_deref() == Some(commit_key)
        }))
    }
}
