//! Stack lifecycle management.
//!
//! This module provides:
//! - [`StackLifecycleController`], the per-stack create/recreate/update state machine
//! - Bounded, cancellable status polling ([`PollConfig`])
//! - Retry with backoff for transient provider errors ([`RetryConfig`])

mod controller;
mod poller;
mod retry;

pub use controller::StackLifecycleController;
pub use poller::PollConfig;
pub use retry::{with_retry, BackoffStrategy, JitterStrategy, RetryConfig};
