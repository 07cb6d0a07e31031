//! Domain types for khata.
//!
//! This module contains the core data structures:
//! - Draft: Parser-produced guess of an expense or ledger entry
//! - Reference: Clients (parties) and categories entries foreign-key to
//! - Entry: Payloads sent to the backend and the records it returns
//! - State: Reconciliation workflow states
//! - Events: Journal records of workflow transitions

pub mod draft;
pub mod entry;
pub mod events;
pub mod reference;
pub mod state;

// Re-export commonly used types
pub use draft::{DraftDetails, EntryDraft, EntryKind, LedgerDraft, LedgerTransactionType};
pub use entry::{NewEntry, NewExpense, NewLedgerTransaction, PersistedEntry};
pub use events::{WorkflowEvent, WorkflowEventType};
pub use reference::{ReferenceCache, ReferenceEntity, ReferenceKind, ReferenceSet};
pub use state::WorkflowState;
