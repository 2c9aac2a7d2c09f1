//! The standard certificate → website → pipeline chain.

use super::{DeploymentPlan, StackSpec, TemplateHandle};
use crate::config::DeployConfig;
use crate::errors::{ConfigError, StackflowError};
use crate::plan::Capability;
use std::path::Path;

/// Output of the certificate stack consumed by the website stack.
pub const CERTIFICATE_ARN: &str = "CertificateArn";
/// Output of the website stack consumed by the pipeline stack.
pub const DISTRIBUTION_ID: &str = "DistributionId";
/// Output of the website stack consumed by the pipeline stack.
pub const ROOT_BUCKET_NAME: &str = "RootBucketName";

/// Templates for the three stacks of the standard chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSet {
    /// Certificate stack template.
    pub certificate: TemplateHandle,
    /// Website stack template.
    pub primary: TemplateHandle,
    /// Pipeline stack template.
    pub pipeline: TemplateHandle,
}

impl TemplateSet {
    /// Creates a template set from already loaded handles.
    #[must_use]
    pub fn new(certificate: TemplateHandle, primary: TemplateHandle, pipeline: TemplateHandle) -> Self {
        Self {
            certificate,
            primary,
            pipeline,
        }
    }

    /// Reads the three template files named in `config` from `dir`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` naming the first file that cannot be read.
    pub fn load_dir(dir: impl AsRef<Path>, config: &DeployConfig) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let load = |file: &str| -> Result<TemplateHandle, ConfigError> {
            let path = dir.join(file);
            let body = std::fs::read_to_string(&path).map_err(|e| ConfigError::Load {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            Ok(TemplateHandle::new(file, body))
        };

        Ok(Self {
            certificate: load(&config.certificate.template_file)?,
            primary: load(&config.primary.template_file)?,
            pipeline: load(&config.pipeline.template_file)?,
        })
    }
}

impl DeploymentPlan {
    /// Builds the three-stack chain described by `config`.
    ///
    /// The website stack receives the certificate ARN and its own region;
    /// the pipeline stack receives the distribution id and root bucket name.
    ///
    /// # Errors
    ///
    /// Returns an error if a stack name is invalid or two stacks share a name.
    pub fn standard_chain(
        config: &DeployConfig,
        templates: &TemplateSet,
    ) -> Result<DeploymentPlan, StackflowError> {
        let certificate = &config.certificate.name;
        let primary = &config.primary.name;
        let primary_region = config.primary_stack_region();

        let plan = DeploymentPlan::builder("standard-chain")
            .stack(
                StackSpec::builder(
                    certificate,
                    config.certificate_stack_region(),
                    templates.certificate.clone(),
                )?
                .capability(Capability::NamedIam)
                .build(),
            )?
            .stack(
                StackSpec::builder(primary, primary_region.clone(), templates.primary.clone())?
                    .output_ref(CERTIFICATE_ARN, certificate, CERTIFICATE_ARN)
                    .literal("DeploymentRegion", primary_region.as_str())
                    .capability(Capability::NamedIam)
                    .build(),
            )?
            .stack(
                StackSpec::builder(
                    &config.pipeline.name,
                    config.pipeline_stack_region(),
                    templates.pipeline.clone(),
                )?
                .output_ref(DISTRIBUTION_ID, primary, DISTRIBUTION_ID)
                .output_ref(ROOT_BUCKET_NAME, primary, ROOT_BUCKET_NAME)
                .capability(Capability::NamedIam)
                .build(),
            )?
            .build()?;

        Ok(plan)
    }
}
