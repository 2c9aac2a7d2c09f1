//! The cloud provider boundary.
//!
//! The deployment core talks to the provider only through
//! [`CloudProviderClient`]. Implementations translate their wire protocol's
//! failures into [`ProviderErrorKind`](crate::errors::ProviderErrorKind)s.

mod simulated;

pub use simulated::SimulatedCloud;

use crate::core::{Outputs, Region, StackStatus};
use crate::errors::ProviderError;
use crate::plan::{Capability, TemplateHandle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A single output declared by a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    /// The output key.
    pub key: String,
    /// The output value.
    pub value: String,
    /// Optional description from the template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StackOutput {
    /// Creates an output without a description.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            description: None,
        }
    }
}

/// The provider's view of a stack at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    /// The stack name.
    pub name: String,
    /// The current status.
    pub status: StackStatus,
    /// Provider explanation of the status, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// Declared outputs, in provider order.
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
}

impl StackDescription {
    /// Creates a description with no outputs.
    #[must_use]
    pub fn new(name: impl Into<String>, status: StackStatus) -> Self {
        Self {
            name: name.into(),
            status,
            status_reason: None,
            outputs: Vec::new(),
        }
    }

    /// Adds an output.
    #[must_use]
    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.push(StackOutput::new(key, value));
        self
    }

    /// Replaces the outputs.
    #[must_use]
    pub fn with_outputs(mut self, outputs: &Outputs) -> Self {
        self.outputs = outputs
            .iter()
            .map(|(k, v)| StackOutput::new(k.clone(), v.clone()))
            .collect();
        self
    }

    /// Sets the status reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.status_reason = Some(reason.into());
        self
    }
}

/// A resolved template parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    /// The parameter key.
    pub key: String,
    /// The parameter value.
    pub value: String,
}

impl Parameter {
    /// Creates a parameter.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A create or update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    /// The stack name.
    pub name: String,
    /// The template to apply.
    pub template: TemplateHandle,
    /// Resolved parameters.
    pub parameters: Vec<Parameter>,
    /// Acknowledged capabilities.
    pub capabilities: Vec<Capability>,
}

/// Operations issued against the provider, used in call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderOp {
    /// `describe`
    Describe,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
}

impl fmt::Display for ProviderOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Describe => write!(f, "describe"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCall {
    /// The operation.
    pub op: ProviderOp,
    /// The stack it targeted.
    pub stack: String,
}

impl ProviderCall {
    /// Creates a call record.
    #[must_use]
    pub fn new(op: ProviderOp, stack: impl Into<String>) -> Self {
        Self {
            op,
            stack: stack.into(),
        }
    }
}

/// Client for one provider region.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudProviderClient: Send + Sync {
    /// Describes a stack. Returns a `NotFound` error if it does not exist.
    async fn describe(&self, name: &str) -> Result<StackDescription, ProviderError>;

    /// Starts creating a stack.
    async fn create(&self, request: &StackRequest) -> Result<(), ProviderError>;

    /// Starts updating a stack. Returns `NoUpdates` if nothing would change
    /// and `NotFound` if the stack does not exist.
    async fn update(&self, request: &StackRequest) -> Result<(), ProviderError>;

    /// Starts deleting a stack.
    async fn delete(&self, name: &str) -> Result<(), ProviderError>;
}

/// Provider clients keyed by region.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<Region, Arc<dyn CloudProviderClient>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the client for a region, replacing any previous one.
    #[must_use]
    pub fn with_client(mut self, region: Region, client: Arc<dyn CloudProviderClient>) -> Self {
        self.register(region, client);
        self
    }

    /// Registers the client for a region in place.
    pub fn register(&mut self, region: Region, client: Arc<dyn CloudProviderClient>) {
        self.clients.insert(region, client);
    }

    /// Returns the client for a region.
    #[must_use]
    pub fn client(&self, region: &Region) -> Option<Arc<dyn CloudProviderClient>> {
        self.clients.get(region).cloned()
    }

    /// Returns true if a client is registered for the region.
    #[must_use]
    pub fn contains(&self, region: &Region) -> bool {
        self.clients.contains_key(region)
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut regions: Vec<_> = self.clients.keys().map(Region::as_str).collect();
        regions.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("regions", &regions)
            .finish()
    }
}
