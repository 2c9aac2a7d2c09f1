//! Core domain model types for stackflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Remote stack status catalog and state classification
//! - Lifecycle outcomes and stack outputs
//! - Validated regions

mod outcome;
mod region;
mod status;

pub use outcome::{Outcome, Outputs};
pub use region::{Region, KNOWN_REGIONS};
pub use status::{StackState, StackStatus};
