//! Transition results.
//!
//! Every workflow operation returns the state it moved from, the state it
//! moved to, and what changed, so a front end can decide what to redraw.

use uuid::Uuid;

use crate::domain::{
    PersistedEntry, ReferenceEntity, ReferenceKind, WorkflowEvent, WorkflowEventType,
    WorkflowState,
};

/// User or system action on the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Evaluate,
    QuickCreate,
    RefreshReferences,
    Abandon,
    Accept,
    Reject,
    Edit,
    Save,
    Cancel,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::Evaluate => "evaluate",
            Action::QuickCreate => "quick create",
            Action::RefreshReferences => "refresh references",
            Action::Abandon => "abandon",
            Action::Accept => "accept",
            Action::Reject => "reject",
            Action::Edit => "edit",
            Action::Save => "save",
            Action::Cancel => "cancel",
        }
    }
}

/// Why a draft was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Missing reference not created
    Abandoned,
    /// Confirmation rejected
    Rejected,
    /// Edit form cancelled
    EditCancelled,
    /// Cancellation token fired
    Cancelled,
}

impl DiscardReason {
    pub fn name(self) -> &'static str {
        match self {
            DiscardReason::Abandoned => "abandoned",
            DiscardReason::Rejected => "rejected",
            DiscardReason::EditCancelled => "edit cancelled",
            DiscardReason::Cancelled => "cancelled",
        }
    }
}

/// What a transition changed
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Draft passed reconciliation
    DraftReady,
    /// Draft names a category/party that must be created first
    ReferenceRequired { kind: ReferenceKind, name: String },
    /// Reference data reloaded without resolving anything
    ReferencesReloaded,
    /// Missing category/party created
    ReferenceCreated { kind: ReferenceKind, entity: ReferenceEntity },
    /// Draft copied into the edit buffer
    EditStarted,
    /// Entry persisted
    Committed {
        entry: PersistedEntry,
        commit_key: String,
    },
    /// Draft dropped without persisting
    Discarded(DiscardReason),
    /// Action not defined in the current state; nothing happened
    Ignored(Action),
}

/// Result of one workflow operation
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub change: Change,
}

impl Transition {
    pub fn is_ignored(&self) -> bool {
        matches!(self.change, Change::Ignored(_))
    }

    /// Journal record for this transition (none for no-ops)
    pub fn to_event(&self, workflow_id: Uuid) -> Option<WorkflowEvent> {
        let (event_type, summary) = match &self.change {
            Change::DraftReady => (WorkflowEventType::DraftReady, "draft ready for confirmation".to_string()),
            Change::ReferenceRequired { kind, name } => (
                WorkflowEventType::ReferenceRequired,
                format!("{} '{}' not found", kind, name),
            ),
            Change::ReferencesReloaded => return None,
            Change::ReferenceCreated { kind, entity } => (
                WorkflowEventType::ReferenceCreated,
                format!("created {} '{}' ({})", kind, entity.name, entity.id),
            ),
            Change::EditStarted => (WorkflowEventType::EditStarted, "editing draft".to_string()),
            Change::Committed { entry, commit_key } => {
                let event = WorkflowEvent::new(
                    workflow_id,
                    WorkflowEventType::Committed,
                    self.from.clone(),
                    self.to.clone(),
                    format!("{} persisted as {}", entry.entry.summary(), entry.id),
                )
                .with_commit_key(commit_key.clone());
                return Some(event);
            }
            Change::Discarded(reason) => (WorkflowEventType::Discarded, reason.name().to_string()),
            Change::Ignored(_) => return None,
        };

        Some(WorkflowEvent::new(
            workflow_id,
            event_type,
            self.from.clone(),
            self.to.clone(),
            summary,
        ))
    }
}
