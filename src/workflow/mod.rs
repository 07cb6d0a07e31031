//! Voice-entry reconciliation workflow.
//!
//! This module contains:
//! - Reconciler: The draft reconciliation state machine
//! - EditBuffer: Form copy of a draft and the shared field mapping
//! - Transition: What each operation changed
//! - VoiceSession: Capture plus reconciliation, one cycle at a time

pub mod clock;
pub mod edit;
pub mod error;
pub mod machine;
pub mod session;
pub mod transition;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use edit::{draft_to_entry, resolve_date, EditBuffer};
pub use error::WorkflowError;
pub use machine::{commit_key, Reconciler};
pub use session::VoiceSession;
pub use transition::{Action, Change, DiscardReason, Transition};
