//! Deployment event emission.
//!
//! Event type names used by the orchestrator and lifecycle controller.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A plan run started.
pub const PLAN_STARTED: &str = "plan.started";
/// The orchestrator moved on to the next stack.
pub const PLAN_STACK_STARTED: &str = "plan.stack_started";
/// Every stack in the plan succeeded.
pub const PLAN_COMPLETED: &str = "plan.completed";
/// The plan stopped early.
pub const PLAN_ABORTED: &str = "plan.aborted";
/// A create, update or delete was issued.
pub const STACK_ACTION: &str = "stack.action";
/// One status poll observed a status.
pub const STACK_POLL: &str = "stack.poll";
/// A lifecycle invocation ended successfully.
pub const STACK_COMPLETED: &str = "stack.completed";
/// A lifecycle invocation failed.
pub const STACK_FAILED: &str = "stack.failed";
