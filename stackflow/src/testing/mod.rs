//! Testing utilities for stackflow deployments.
//!
//! This module provides:
//! - A scripted, call-recording provider client
//! - Assertions for lifecycle outcomes and plan results

mod assertions;
mod mocks;

pub use assertions::{
    assert_aborted_at, assert_failed_with, assert_no_change, assert_outputs_eq, assert_succeeded,
};
pub use mocks::RecordingProvider;
