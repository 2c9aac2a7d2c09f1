//! Error types for stackflow.
//!
//! Provider failures are classified by [`ProviderErrorKind`] at the client
//! boundary, so nothing in the deployment core inspects free-text messages.
//! Failures that end a single stack operation are [`DeployFailure`]s; errors
//! that stop a run before any provider call are [`StackflowError`]s.

use crate::core::StackStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for stackflow operations that fail before or outside
/// of a single stack's lifecycle.
#[derive(Debug, Error)]
pub enum StackflowError {
    /// A deployment plan failed validation.
    #[error("{0}")]
    Validation(#[from] PlanValidationError),

    /// Configuration was invalid or could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when a deployment plan is structurally invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PlanValidationError {
    /// The error message.
    pub message: String,
    /// Stable error code (e.g., "PLAN-002-DUPLICATE").
    pub code: &'static str,
    /// The stacks involved in the error.
    pub stacks: Vec<String>,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl PlanValidationError {
    /// Creates a new plan validation error.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            stacks: Vec::new(),
            fix_hint: None,
        }
    }

    /// Sets the stacks involved.
    #[must_use]
    pub fn with_stacks(mut self, stacks: Vec<String>) -> Self {
        self.stacks = stacks;
        self
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("stacks".to_string(), serde_json::json!(self.stacks));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        map
    }
}

/// Errors raised while building or validating configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The region identifier is not in the recognized set.
    #[error("Unknown region '{0}'")]
    UnknownRegion(String),

    /// The stack name does not satisfy the provider naming rules.
    #[error("Invalid stack name '{0}': must start with a letter, contain only letters, digits and hyphens, and be at most 128 characters")]
    InvalidStackName(String),

    /// Polling bounds are unusable.
    #[error("Invalid poll settings: {0}")]
    InvalidPoll(String),

    /// No provider client is registered for a region the plan uses.
    #[error("No provider client registered for region '{region}' (needed by stack '{stack}')")]
    MissingClient {
        /// The region without a client.
        region: String,
        /// The first stack that targets it.
        stack: String,
    },

    /// A configuration or template file could not be loaded.
    #[error("Failed to load '{path}': {message}")]
    Load {
        /// The file path.
        path: String,
        /// What went wrong.
        message: String,
    },
}

/// Typed classification of a provider call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The named stack does not exist.
    NotFound,
    /// A create was issued for a stack that already exists.
    AlreadyExists,
    /// The update would not change anything.
    NoUpdates,
    /// A transient provider-side condition (throttling, 5xx, network).
    Transient,
    /// The provider rejected the request (validation, permissions, busy stack).
    Rejected,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::NoUpdates => write!(f, "no_updates"),
            Self::Transient => write!(f, "transient"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// An error returned by a [`CloudProviderClient`](crate::provider::CloudProviderClient).
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("Provider error ({kind}) for stack '{stack}': {message}")]
pub struct ProviderError {
    /// The error classification.
    pub kind: ProviderErrorKind,
    /// The stack the call targeted.
    pub stack: String,
    /// Provider-supplied detail, for display only.
    pub message: String,
}

impl ProviderError {
    /// Creates a provider error of the given kind.
    #[must_use]
    pub fn new(kind: ProviderErrorKind, stack: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            stack: stack.into(),
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(stack: impl Into<String>) -> Self {
        let stack = stack.into();
        let message = format!("Stack with id {stack} does not exist");
        Self::new(ProviderErrorKind::NotFound, stack, message)
    }

    /// Creates an already-exists error.
    #[must_use]
    pub fn already_exists(stack: impl Into<String>) -> Self {
        let stack = stack.into();
        let message = format!("Stack [{stack}] already exists");
        Self::new(ProviderErrorKind::AlreadyExists, stack, message)
    }

    /// Creates a no-updates error.
    #[must_use]
    pub fn no_updates(stack: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NoUpdates, stack, "No updates are to be performed")
    }

    /// Creates a transient error.
    #[must_use]
    pub fn transient(stack: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transient, stack, message)
    }

    /// Creates a rejected error.
    #[must_use]
    pub fn rejected(stack: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Rejected, stack, message)
    }

    /// Returns true if the call may succeed when repeated.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }

    /// Returns true if the stack does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ProviderErrorKind::NotFound
    }
}

/// Error raised when a binding references an output the source stack does
/// not expose.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("Stack '{stack}' does not expose output '{key}'")]
pub struct MissingOutputError {
    /// The stack expected to expose the output.
    pub stack: String,
    /// The missing output key.
    pub key: String,
}

impl MissingOutputError {
    /// Creates a new missing output error.
    #[must_use]
    pub fn new(stack: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            key: key.into(),
        }
    }
}

/// Why a single stack operation ended in `Failed`.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum DeployFailure {
    /// The stack settled in a failure or rollback status.
    #[error("Stack '{stack}' finished in status {status}")]
    TerminalStatus {
        /// The stack name.
        stack: String,
        /// The terminal status observed.
        status: StackStatus,
    },

    /// Deleting a recoverable stack did not complete.
    #[error("Stack '{stack}' could not be deleted for recreation (status {status})")]
    DeleteFailed {
        /// The stack name.
        stack: String,
        /// The status the delete settled in.
        status: StackStatus,
    },

    /// Polling exceeded its attempt or time budget.
    #[error("Timed out waiting for stack '{stack}' after {attempts} polls ({waited_ms} ms)")]
    Timeout {
        /// The stack name.
        stack: String,
        /// Number of status queries issued.
        attempts: u32,
        /// Time spent waiting in milliseconds.
        waited_ms: u64,
    },

    /// The operation was cancelled by the operator.
    #[error("Deployment of stack '{stack}' cancelled: {reason}")]
    Cancelled {
        /// The stack name.
        stack: String,
        /// The cancellation reason.
        reason: String,
    },

    /// The stack disappeared while a create or update was in flight.
    #[error("Stack '{stack}' vanished while being deployed")]
    Vanished {
        /// The stack name.
        stack: String,
    },

    /// Another lifecycle operation for the same stack is already running.
    #[error("Stack '{stack}' already has a lifecycle operation in flight")]
    StackBusy {
        /// The stack name.
        stack: String,
    },

    /// A provider call failed in a way the lifecycle cannot absorb.
    #[error("{0}")]
    Provider(#[from] ProviderError),
}

impl DeployFailure {
    /// Returns a short machine-readable label for the failure.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::TerminalStatus { .. } => "terminal_status",
            Self::DeleteFailed { .. } => "delete_failed",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::Vanished { .. } => "vanished",
            Self::StackBusy { .. } => "stack_busy",
            Self::Provider(_) => "provider",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_validation_error_to_dict() {
        let err = PlanValidationError::new("PLAN-002-DUPLICATE", "Duplicate stack 'a'")
            .with_stacks(vec!["a".to_string()])
            .with_fix_hint("Rename one of the stacks");

        let dict = err.to_dict();
        assert_eq!(dict.get("code").unwrap(), "PLAN-002-DUPLICATE");
        assert_eq!(dict.get("message").unwrap(), "Duplicate stack 'a'");
        assert!(dict.contains_key("fix_hint"));
    }

    #[test]
    fn test_provider_error_kinds() {
        assert!(ProviderError::not_found("web").is_not_found());
        assert!(ProviderError::transient("web", "Rate exceeded").is_transient());
        assert!(!ProviderError::no_updates("web").is_transient());
        assert_eq!(ProviderError::already_exists("web").kind, ProviderErrorKind::AlreadyExists);
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::not_found("web");
        assert_eq!(
            err.to_string(),
            "Provider error (not_found) for stack 'web': Stack with id web does not exist"
        );
    }

    #[test]
    fn test_deploy_failure_serializes_with_failure_tag() {
        let failure = DeployFailure::TerminalStatus {
            stack: "web".to_string(),
            status: StackStatus::UpdateRollbackComplete,
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["failure"], "terminal_status");
        assert_eq!(json["status"], "UPDATE_ROLLBACK_COMPLETE");
        assert_eq!(failure.label(), "terminal_status");
    }

    #[test]
    fn test_deploy_failure_from_provider_error() {
        let failure: DeployFailure = ProviderError::rejected("web", "Template format error").into();
        assert_eq!(failure.label(), "provider");
        assert!(failure.to_string().contains("Template format error"));
    }

    #[test]
    fn test_missing_output_display() {
        let err = MissingOutputError::new("acm", "CertificateArn");
        assert_eq!(err.to_string(), "Stack 'acm' does not expose output 'CertificateArn'");
    }
}
