//! # Stackflow
//!
//! Ordered, fail-fast deployment of chained cloud infrastructure stacks.
//!
//! Stackflow applies a linear chain of stacks where later stacks consume
//! outputs of earlier ones, with support for:
//!
//! - **Per-stack lifecycle**: create, recreate after a failed rollback, or update
//! - **Bounded polling**: every wait has an attempt and time budget and can be cancelled
//! - **Output chaining**: parameters bound to outputs of stacks applied earlier in the run
//! - **Typed provider errors**: transient errors retried with backoff, the rest classified
//! - **Event-driven observability**: plan and stack events through an [`events::EventSink`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stackflow::prelude::*;
//!
//! let config = DeployConfig::default();
//! let templates = TemplateSet::load_dir(".", &config)?;
//! let plan = DeploymentPlan::standard_chain(&config, &templates)?;
//!
//! let providers = ProviderRegistry::new()
//!     .with_client(Region::us_east_1(), acm_client)
//!     .with_client(Region::us_west_2(), main_client);
//!
//! let result = DeploymentOrchestrator::from_config(providers, &config)
//!     .run(&plan)
//!     .await?;
//! std::process::exit(result.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod orchestrator;
pub mod outputs;
pub mod plan;
pub mod provider;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{DeployConfig, StackConfig};
    pub use crate::core::{Outcome, Outputs, Region, StackState, StackStatus};
    pub use crate::errors::{
        ConfigError, DeployFailure, MissingOutputError, PlanValidationError, ProviderError,
        ProviderErrorKind, StackflowError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::lifecycle::{PollConfig, RetryConfig, StackLifecycleController};
    pub use crate::orchestrator::{AbortInfo, AbortReason, DeploymentOrchestrator, PlanResult, StackReport};
    pub use crate::outputs::{OutputResolver, OutputTable};
    pub use crate::plan::{DeploymentPlan, StackSpec, TemplateHandle, TemplateSet};
    pub use crate::provider::{
        CloudProviderClient, Parameter, ProviderRegistry, SimulatedCloud, StackDescription,
        StackRequest,
    };
}
