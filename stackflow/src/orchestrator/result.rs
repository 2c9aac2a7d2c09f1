//! Deployment run result.

use crate::core::{Outcome, Outputs, Region};
use crate::errors::{DeployFailure, MissingOutputError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What happened to one stack of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackReport {
    /// The stack name.
    pub stack: String,
    /// The region it was deployed to.
    pub region: Region,
    /// The lifecycle outcome.
    pub outcome: Outcome,
    /// Time spent in the lifecycle in milliseconds.
    pub duration_ms: f64,
}

/// Why a run stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "abort", rename_all = "snake_case")]
pub enum AbortReason {
    /// The stack's lifecycle ended in `Failed`.
    Failed(DeployFailure),
    /// A binding referenced an output that no prior stack produced.
    MissingOutput(MissingOutputError),
    /// The run was cancelled before the stack started.
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(failure) => write!(f, "{failure}"),
            Self::MissingOutput(missing) => write!(f, "{missing}"),
            Self::Cancelled { reason } => write!(f, "Cancelled: {reason}"),
        }
    }
}

/// The plan entry a run stopped at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortInfo {
    /// Zero-based position of the entry in the plan.
    pub index: usize,
    /// The stack name.
    pub stack: String,
    /// Why the run stopped.
    pub reason: AbortReason,
}

/// Result of a deployment run.
///
/// `completed` holds every stack whose lifecycle ran, in plan order,
/// including a final `Failed` one. Stacks after an abort never appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// The plan name.
    pub plan: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Total run time in milliseconds.
    pub duration_ms: f64,
    /// Per-stack reports in plan order.
    pub completed: Vec<StackReport>,
    /// Set if the run stopped before the end of the plan.
    pub aborted_at: Option<AbortInfo>,
}

impl PlanResult {
    /// Returns true if every stack succeeded or needed no change.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.aborted_at.is_none()
    }

    /// Process exit code for this result: 0 on success, 1 on abort.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_success())
    }

    /// Returns the report for a stack.
    #[must_use]
    pub fn report(&self, stack: &str) -> Option<&StackReport> {
        self.completed.iter().find(|r| r.stack == stack)
    }

    /// Returns the outputs a stack produced in this run.
    #[must_use]
    pub fn outputs(&self, stack: &str) -> Option<&Outputs> {
        self.report(stack).and_then(|r| r.outcome.outputs())
    }
}
