//! Error taxonomy for the capture and reconciliation workflow.
//!
//! Boundary failures are converted into one of these kinds at the call
//! site; none of them is fatal, every one leaves the workflow in a
//! stable state.

use thiserror::Error;

use crate::domain::ReferenceKind;

/// Errors surfaced by the voice-entry workflow
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    /// Capture device denied or unavailable
    #[error("Capture device unavailable: {0}")]
    Device(String),

    /// Parser failed or returned unusable data
    #[error("Could not parse recording: {0}")]
    Parse(String),

    /// A field needs correcting before resubmission
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// The category/party no longer (or never did) exist
    #[error("{kind} '{name}' does not exist, add it first")]
    ReferenceMissing { kind: ReferenceKind, name: String },

    /// Any other boundary call failure
    #[error("Network error: {0}")]
    Network(String),

    /// The workflow instance was cancelled; late results are discarded
    #[error("Workflow cancelled")]
    Cancelled,

    /// A capture or confirmation is already in progress
    #[error("Another entry is still being captured or confirmed")]
    Busy,

    /// Operation not defined for the current state
    #[error("Cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },
}

impl WorkflowError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable kind name
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Device(_) => "device_error",
            WorkflowError::Parse(_) => "parse_error",
            WorkflowError::Validation { .. } => "validation_error",
            WorkflowError::ReferenceMissing { .. } => "reference_missing",
            WorkflowError::Network(_) => "network_error",
            WorkflowError::Cancelled => "cancelled",
            WorkflowError::Busy => "busy",
            WorkflowError::InvalidTransition { .. } => "invalid_transition",
        }
    }
}

impl From<reqwest::Error> for WorkflowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WorkflowError::Network(format!("request timed out: {}", err))
        } else {
            WorkflowError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = WorkflowError::ReferenceMissing {
            kind: ReferenceKind::Category,
            name: "Fuel".to_string(),
        };
        assert_eq!(err.to_string(), "category 'Fuel' does not exist, add it first");
        assert_eq!(err.kind(), "reference_missing");

        let err = WorkflowError::validation("amount", "not a number");
        assert_eq!(err.to_string(), "Invalid amount: not a number");
    }
}
