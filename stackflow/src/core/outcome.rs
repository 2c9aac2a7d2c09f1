//! Terminal outcome of one lifecycle invocation.

use crate::errors::DeployFailure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outputs exposed by a stack, keyed by output name.
pub type Outputs = BTreeMap<String, String>;

/// How a call to `ensure` ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// The stack was created, updated or recreated.
    Succeeded {
        /// Outputs reported by the terminal describe.
        outputs: Outputs,
    },
    /// The stack already matched the requested template and parameters.
    NoChange {
        /// Outputs of the unchanged stack.
        outputs: Outputs,
    },
    /// The stack could not be brought to a successful state.
    Failed {
        /// Why the operation failed.
        reason: DeployFailure,
    },
}

impl Outcome {
    /// Creates a succeeded outcome.
    #[must_use]
    pub fn succeeded(outputs: Outputs) -> Self {
        Self::Succeeded { outputs }
    }

    /// Creates a no-change outcome.
    #[must_use]
    pub fn no_change(outputs: Outputs) -> Self {
        Self::NoChange { outputs }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failed(reason: impl Into<DeployFailure>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Returns true for `Succeeded` and `NoChange`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Returns the outputs of a successful outcome.
    #[must_use]
    pub fn outputs(&self) -> Option<&Outputs> {
        match self {
            Self::Succeeded { outputs } | Self::NoChange { outputs } => Some(outputs),
            Self::Failed { .. } => None,
        }
    }

    /// Returns the failure reason, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&DeployFailure> {
        match self {
            Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Returns the upper-case label used in reports.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "SUCCEEDED",
            Self::NoChange { .. } => "NO_CHANGE",
            Self::Failed { .. } => "FAILED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "FAILED ({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StackStatus;

    #[test]
    fn test_outcome_success_accessors() {
        let mut outputs = Outputs::new();
        outputs.insert("DistributionId".to_string(), "E123".to_string());

        let outcome = Outcome::no_change(outputs.clone());
        assert!(outcome.is_success());
        assert_eq!(outcome.outputs(), Some(&outputs));
        assert!(outcome.failure().is_none());
        assert_eq!(outcome.to_string(), "NO_CHANGE");
    }

    #[test]
    fn test_outcome_failed_display() {
        let outcome = Outcome::failed(DeployFailure::TerminalStatus {
            stack: "web".to_string(),
            status: StackStatus::CreateFailed,
        });
        assert!(!outcome.is_success());
        assert!(outcome.outputs().is_none());
        assert_eq!(
            outcome.to_string(),
            "FAILED (Stack 'web' finished in status CREATE_FAILED)"
        );
    }

    #[test]
    fn test_outcome_serialize() {
        let json = serde_json::to_value(Outcome::succeeded(Outputs::new())).unwrap();
        assert_eq!(json["outcome"], "SUCCEEDED");
    }
}
