//! Journal records for workflow transitions.
//!
//! Every transition of a reconciliation workflow is recorded as an
//! immutable event in an append-only log for audit and debugging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::WorkflowState;

/// A single event in the append-only journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The workflow instance this event belongs to
    pub workflow_id: Uuid,

    /// Type of event
    pub event_type: WorkflowEventType,

    /// State before the transition
    pub from: WorkflowState,

    /// State after the transition
    pub to: WorkflowState,

    /// Human-readable summary (no transcripts)
    pub summary: String,

    /// Commit key format: "{workflow_id}:{kind}:{payload_hash}"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_key: Option<String>,
}

impl WorkflowEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        workflow_id: Uuid,
        event_type: WorkflowEventType,
        from: WorkflowState,
        to: WorkflowState,
        summary: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            workflow_id,
            event_type,
            from,
            to,
            summary,
            commit_key: None,
        }
    }

    /// Attach the commit key of a persisted entry
    pub fn with_commit_key(mut self, key: String) -> Self {
        self.commit_key = Some(key);
        self
    }
}

/// Types of events a workflow records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventType {
    /// A draft passed reconciliation and awaits confirmation
    DraftReady,

    /// A draft references a missing category/party
    ReferenceRequired,

    /// A missing category/party was quick-created
    ReferenceCreated,

    /// Draft copied into the edit buffer
    EditStarted,

    /// Entry persisted
    Committed,

    /// Draft discarded (reject, cancel, abandon)
    Discarded,

    /// A boundary call failed; state kept or routed back
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = WorkflowEvent::new(
            Uuid::new_v4(),
            WorkflowEventType::Committed,
            WorkflowState::Committing,
            WorkflowState::Idle,
            "expense 500 on 2024-03-09".to_string(),
        )
        .with_commit_key("k".to_string());

        let json = serde_json::to_string(&event).unwrap();
        let parsed: WorkflowEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.event_type, WorkflowEventType::Committed);
        assert_eq!(parsed.to, WorkflowState::Idle);
        assert_eq!(parsed.commit_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_commit_key_omitted_when_absent() {
        let event = WorkflowEvent::new(
            Uuid::new_v4(),
            WorkflowEventType::Discarded,
            WorkflowState::AwaitingConfirmation,
            WorkflowState::Abandoned,
            "rejected".to_string(),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("commit_key"));
    }
}
