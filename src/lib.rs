//! khata - Voice-driven expense and client-ledger entry
//!
//! A spoken clip is parsed by an external service into an entry draft.
//! Before anything is persisted, the draft is reconciled against the
//! known categories and parties, confirmed (or edited) by the user, and
//! committed exactly once.
//!
//! # Architecture
//!
//! - Every workflow operation returns a `Transition` naming the state
//!   it left, the state it entered, and what changed
//! - Each transition can be appended to a JSONL journal
//! - Each commit carries an idempotency key, so a retried request never
//!   creates a second record
//!
//! # Modules
//!
//! - `adapters`: Backend integrations (REST client, in-memory backend)
//! - `capture`: Audio capture lifecycle
//! - `domain`: Data structures (EntryDraft, ReferenceEntity, NewEntry)
//! - `workflow`: Reconciliation state machine and voice session
//! - `journal`: Append-only workflow event log
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Parse a recorded clip and confirm the entry
//! khata voice clip.webm
//!
//! # List categories
//! khata categories
//!
//! # Check whether a commit was recorded
//! khata journal --commit <key>
//! ```

pub mod adapters;
pub mod capture;
pub mod cli;
pub mod config;
pub mod domain;
pub mod journal;
pub mod workflow;

// Re-export main types at crate root for convenience
pub use adapters::{Backend, BackendClient, InMemoryBackend};
pub use capture::{AudioClip, CaptureController, CaptureState};
pub use domain::{EntryDraft, NewEntry, ReferenceEntity, ReferenceKind, WorkflowState};
pub use journal::Journal;
pub use workflow::{Reconciler, Transition, VoiceSession, WorkflowError};
