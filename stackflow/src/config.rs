//! Deployment configuration.
//!
//! One [`DeployConfig`] value is built at startup (defaults, then an optional
//! JSON file, then command-line overrides) and passed to everything that
//! needs it.

use crate::core::Region;
use crate::errors::ConfigError;
use crate::lifecycle::{PollConfig, RetryConfig};
use crate::plan::validate_stack_name;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one stack of the standard chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Stack name at the provider.
    pub name: String,
    /// Template file name, relative to the templates directory.
    pub template_file: String,
    /// Region override. Falls back to the chain's default for this stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    /// Output keys the stack's template declares.
    #[serde(default)]
    pub exports: Vec<String>,
}

impl StackConfig {
    /// Creates a stack config with no region override or exports.
    #[must_use]
    pub fn new(name: impl Into<String>, template_file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template_file: template_file.into(),
            region: None,
            exports: Vec::new(),
        }
    }

    /// Pins the stack to a region.
    #[must_use]
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Declares an exported output key.
    #[must_use]
    pub fn with_export(mut self, key: impl Into<String>) -> Self {
        self.exports.push(key.into());
        self
    }

    /// Returns the override region, or `default` if none is set.
    #[must_use]
    pub fn region_or(&self, default: &Region) -> Region {
        self.region.clone().unwrap_or_else(|| default.clone())
    }
}

/// Configuration for a deployment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// The certificate stack.
    pub certificate: StackConfig,
    /// The primary website stack.
    pub primary: StackConfig,
    /// The delivery pipeline stack.
    pub pipeline: StackConfig,
    /// Region for the primary and pipeline stacks.
    pub primary_region: Region,
    /// Region for the certificate stack.
    pub certificate_region: Region,
    /// Status polling bounds.
    pub poll: PollConfig,
    /// Transient provider error retry policy.
    pub retry: RetryConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            certificate: StackConfig::new("acm-certificate-stack", "acm-certificate-stack.yaml")
                .with_export("CertificateArn"),
            primary: StackConfig::new("portfolio-website-stack", "portfolio-website-stack.yaml")
                .with_export("DistributionId")
                .with_export("RootBucketName"),
            pipeline: StackConfig::new("cicd-pipeline-stack", "cicd-pipeline-stack.yaml"),
            primary_region: Region::us_west_2(),
            certificate_region: Region::us_east_1(),
            poll: PollConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl DeployConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the region for the primary and pipeline stacks.
    #[must_use]
    pub fn with_primary_region(mut self, region: Region) -> Self {
        self.primary_region = region;
        self
    }

    /// Sets the polling bounds.
    #[must_use]
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Loads a configuration from a JSON file. Missing fields take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if the file cannot be read or parsed, or
    /// any error from [`DeployConfig::validate`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let load_error = |message: String| ConfigError::Load {
            path: path.display().to_string(),
            message,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| load_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks stack names and polling bounds.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for stack in [&self.certificate, &self.primary, &self.pipeline] {
            validate_stack_name(&stack.name)?;
        }
        self.poll.validate()
    }

    /// Region the certificate stack deploys to.
    #[must_use]
    pub fn certificate_stack_region(&self) -> Region {
        self.certificate.region_or(&self.certificate_region)
    }

    /// Region the primary stack deploys to.
    #[must_use]
    pub fn primary_stack_region(&self) -> Region {
        self.primary.region_or(&self.primary_region)
    }

    /// Region the pipeline stack deploys to.
    #[must_use]
    pub fn pipeline_stack_region(&self) -> Region {
        self.pipeline.region_or(&self.primary_region)
    }
}
