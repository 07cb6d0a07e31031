//! Reconciliation workflow states.

use serde::{Deserialize, Serialize};

use super::reference::ReferenceKind;

/// State of one reconciliation workflow instance
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum WorkflowState {
    /// No draft loaded, or the last draft was committed
    #[default]
    Idle,

    /// The draft names a category/party that does not exist yet
    NeedsReference { kind: ReferenceKind, name: String },

    /// Draft is complete and shown for accept / reject / edit
    AwaitingConfirmation,

    /// Draft fields copied into an edit buffer
    Editing,

    /// Persist request in flight
    Committing,

    /// Draft discarded by the user (or cancelled)
    Abandoned,
}

impl WorkflowState {
    /// Short name for logs and the journal
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::NeedsReference { .. } => "needs_reference",
            WorkflowState::AwaitingConfirmation => "awaiting_confirmation",
            WorkflowState::Editing => "editing",
            WorkflowState::Committing => "committing",
            WorkflowState::Abandoned => "abandoned",
        }
    }

    /// True while a draft is owned by the workflow
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            WorkflowState::NeedsReference { .. }
                | WorkflowState::AwaitingConfirmation
                | WorkflowState::Editing
                | WorkflowState::Committing
        )
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowState::NeedsReference { kind, name } => {
                write!(f, "needs_reference({} '{}')", kind, name)
            }
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(!WorkflowState::Idle.is_active());
        assert!(!WorkflowState::Abandoned.is_active());
        assert!(WorkflowState::Editing.is_active());
        assert!(WorkflowState::NeedsReference {
            kind: ReferenceKind::Party,
            name: "Ramesh".to_string()
        }
        .is_active());
    }

    #[test]
    fn test_state_serialization() {
        let state = WorkflowState::NeedsReference {
            kind: ReferenceKind::Category,
            name: "Fuel".to_string(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(
            json,
            r#"{"state":"needs_reference","kind":"category","name":"Fuel"}"#
        );
        let parsed: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
