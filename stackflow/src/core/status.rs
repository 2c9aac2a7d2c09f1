//! Remote stack status catalog and its classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stack status as reported by the cloud provider.
///
/// Parsed from and rendered as the provider's `SCREAMING_SNAKE_CASE`
/// strings. Statuses outside the known catalog are kept verbatim in
/// [`StackStatus::Unknown`] and classified by suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StackStatus {
    /// Create is running.
    CreateInProgress,
    /// Create failed.
    CreateFailed,
    /// Create finished.
    CreateComplete,
    /// A failed create is being rolled back.
    RollbackInProgress,
    /// Rolling back a failed create failed.
    RollbackFailed,
    /// A failed create was rolled back; the stack is unusable.
    RollbackComplete,
    /// Delete is running.
    DeleteInProgress,
    /// Delete failed; resources may remain.
    DeleteFailed,
    /// Delete finished.
    DeleteComplete,
    /// Update is running.
    UpdateInProgress,
    /// Update applied, old resources being cleaned up.
    UpdateCompleteCleanupInProgress,
    /// Update finished.
    UpdateComplete,
    /// Update failed.
    UpdateFailed,
    /// A failed update is being rolled back.
    UpdateRollbackInProgress,
    /// Rolling back a failed update failed.
    UpdateRollbackFailed,
    /// Update rolled back, cleanup running.
    UpdateRollbackCompleteCleanupInProgress,
    /// A failed update was rolled back to the previous state.
    UpdateRollbackComplete,
    /// Stack created by a change set that was never executed.
    ReviewInProgress,
    /// Resource import is running.
    ImportInProgress,
    /// Resource import finished.
    ImportComplete,
    /// A failed import is being rolled back.
    ImportRollbackInProgress,
    /// Rolling back a failed import failed.
    ImportRollbackFailed,
    /// A failed import was rolled back.
    ImportRollbackComplete,
    /// A status not in the known catalog.
    Unknown(String),
}

impl StackStatus {
    /// Returns the provider's string for this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateFailed => "CREATE_FAILED",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::RollbackComplete => "ROLLBACK_COMPLETE",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            Self::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            Self::UpdateRollbackCompleteCleanupInProgress => {
                "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            }
            Self::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            Self::ReviewInProgress => "REVIEW_IN_PROGRESS",
            Self::ImportInProgress => "IMPORT_IN_PROGRESS",
            Self::ImportComplete => "IMPORT_COMPLETE",
            Self::ImportRollbackInProgress => "IMPORT_ROLLBACK_IN_PROGRESS",
            Self::ImportRollbackFailed => "IMPORT_ROLLBACK_FAILED",
            Self::ImportRollbackComplete => "IMPORT_ROLLBACK_COMPLETE",
            Self::Unknown(raw) => raw,
        }
    }

    /// Returns true while a remote operation is still running.
    ///
    /// `REVIEW_IN_PROGRESS` is excluded: it only advances when a change set
    /// is executed, so waiting on it never settles.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, Self::ReviewInProgress) && self.as_str().ends_with("_IN_PROGRESS")
    }

    /// Returns true for statuses that end an operation successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::CreateComplete | Self::UpdateComplete | Self::ImportComplete
        )
    }

    /// Returns true for any failure-suffixed status.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.as_str().ends_with("_FAILED")
    }

    /// Returns true for statuses reached after rolling back a failed operation.
    #[must_use]
    pub fn is_rollback_complete(&self) -> bool {
        matches!(
            self,
            Self::RollbackComplete | Self::UpdateRollbackComplete | Self::ImportRollbackComplete
        )
    }

    /// Returns true if polling for an operation stops at this status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_success()
            || matches!(self, Self::DeleteComplete)
            || self.is_failure()
            || self.is_rollback_complete()
    }

    /// Returns true if the stack can only be recovered by deleting and
    /// recreating it.
    #[must_use]
    pub fn is_recoverable_by_recreate(&self) -> bool {
        matches!(self, Self::RollbackComplete | Self::DeleteFailed)
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_FAILED" => Self::CreateFailed,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "ROLLBACK_IN_PROGRESS" => Self::RollbackInProgress,
            "ROLLBACK_FAILED" => Self::RollbackFailed,
            "ROLLBACK_COMPLETE" => Self::RollbackComplete,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_FAILED" => Self::DeleteFailed,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            "UPDATE_IN_PROGRESS" => Self::UpdateInProgress,
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS" => Self::UpdateCompleteCleanupInProgress,
            "UPDATE_COMPLETE" => Self::UpdateComplete,
            "UPDATE_FAILED" => Self::UpdateFailed,
            "UPDATE_ROLLBACK_IN_PROGRESS" => Self::UpdateRollbackInProgress,
            "UPDATE_ROLLBACK_FAILED" => Self::UpdateRollbackFailed,
            "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS" => {
                Self::UpdateRollbackCompleteCleanupInProgress
            }
            "UPDATE_ROLLBACK_COMPLETE" => Self::UpdateRollbackComplete,
            "REVIEW_IN_PROGRESS" => Self::ReviewInProgress,
            "IMPORT_IN_PROGRESS" => Self::ImportInProgress,
            "IMPORT_COMPLETE" => Self::ImportComplete,
            "IMPORT_ROLLBACK_IN_PROGRESS" => Self::ImportRollbackInProgress,
            "IMPORT_ROLLBACK_FAILED" => Self::ImportRollbackFailed,
            "IMPORT_ROLLBACK_COMPLETE" => Self::ImportRollbackComplete,
            other => Self::Unknown(other.to_string()),
        })
    }
}

impl From<String> for StackStatus {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl From<StackStatus> for String {
    fn from(status: StackStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Classification of a stack as observed by a single describe call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "status", rename_all = "snake_case")]
pub enum StackState {
    /// The stack does not exist (or was fully deleted).
    Absent,
    /// The stack is in a state only recoverable by delete and recreate.
    RecoverableFailed(StackStatus),
    /// The stack exists and is settled; eligible for update.
    Stable(StackStatus),
    /// A remote operation is still running.
    InProgress(StackStatus),
}

impl StackState {
    /// Classifies a describe result. `None` means the provider reported
    /// not-found.
    #[must_use]
    pub fn classify(status: Option<&StackStatus>) -> Self {
        match status {
            None | Some(StackStatus::DeleteComplete) => Self::Absent,
            Some(s) if s.is_recoverable_by_recreate() => Self::RecoverableFailed(s.clone()),
            Some(s) if s.is_in_progress() => Self::InProgress(s.clone()),
            Some(s) => Self::Stable(s.clone()),
        }
    }
}
