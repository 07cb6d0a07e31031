//! Adapter interfaces for the bookkeeping backend.
//!
//! The workflow never talks HTTP directly: it consumes these boundary
//! traits, implemented by the REST client and by an in-memory backend.

pub mod http;
pub mod memory;
pub mod wire;

use async_trait::async_trait;

use crate::capture::AudioClip;
use crate::domain::{EntryDraft, NewEntry, PersistedEntry, ReferenceEntity, ReferenceKind};
use crate::workflow::WorkflowError;

// Re-export the implementations
pub use http::BackendClient;
pub use memory::InMemoryBackend;

/// Submits captured audio to the external voice parser
#[async_trait]
pub trait ParsingClient: Send + Sync {
    /// Transcribe and parse a clip into an entry draft
    async fn submit_audio(&self, clip: &AudioClip) -> Result<EntryDraft, WorkflowError>;
}

/// Reads and creates categories / parties
#[async_trait]
pub trait ReferenceService: Send + Sync {
    /// Current entities of one kind, ordered by name
    async fn list_reference_entities(
        &self,
        kind: ReferenceKind,
    ) -> Result<Vec<ReferenceEntity>, WorkflowError>;

    /// Create an entity; the backend may normalise the name
    async fn create_reference_entity(
        &self,
        kind: ReferenceKind,
        name: &str,
    ) -> Result<ReferenceEntity, WorkflowError>;
}

/// Persists confirmed entries
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Persist an entry. `commit_key` identifies this commit so a retried
    /// request cannot create a second record.
    async fn persist_entry(
        &self,
        entry: &NewEntry,
        commit_key: &str,
    ) -> Result<PersistedEntry, WorkflowError>;
}

/// Everything the workflow needs from the backend
pub trait Backend: ParsingClient + ReferenceService + EntryStore {}

impl<T: ParsingClient + ReferenceService + EntryStore> Backend for T {}
