//! Stack specifications and parameter bindings.

use crate::core::Region;
use crate::errors::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Arc, OnceLock};

const MAX_STACK_NAME_LEN: usize = 128;

fn stack_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z][-A-Za-z0-9]*$").ok())
        .as_ref()
}

/// Validates a stack name against the provider naming rules.
///
/// # Errors
///
/// Returns `ConfigError::InvalidStackName` if the name is empty, too long,
/// or contains characters other than letters, digits and hyphens.
pub fn validate_stack_name(name: &str) -> Result<(), ConfigError> {
    if name.len() > MAX_STACK_NAME_LEN || !stack_name_pattern().is_some_and(|p| p.is_match(name)) {
        return Err(ConfigError::InvalidStackName(name.to_string()));
    }
    Ok(())
}

/// An opaque template document produced by the template generator.
///
/// The body is shared, so cloning a handle is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateHandle {
    name: String,
    body: Arc<str>,
}

impl TemplateHandle {
    /// Creates a template handle from its name and body.
    #[must_use]
    pub fn new(name: impl Into<String>, body: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }

    /// Returns the template name (usually the file it came from).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the template document.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the hex SHA-256 of the body.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.body.as_bytes()))
    }
}

/// Capabilities a stack must acknowledge to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// May create IAM resources.
    #[serde(rename = "CAPABILITY_IAM")]
    Iam,
    /// May create IAM resources with custom names.
    #[serde(rename = "CAPABILITY_NAMED_IAM")]
    NamedIam,
    /// May contain macros that expand the template.
    #[serde(rename = "CAPABILITY_AUTO_EXPAND")]
    AutoExpand,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iam => write!(f, "CAPABILITY_IAM"),
            Self::NamedIam => write!(f, "CAPABILITY_NAMED_IAM"),
            Self::AutoExpand => write!(f, "CAPABILITY_AUTO_EXPAND"),
        }
    }
}

/// Where a parameter's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingValue {
    /// A fixed value.
    Literal(String),
    /// An output of a stack applied earlier in the same run.
    Output {
        /// The stack exposing the output.
        stack: String,
        /// The output key.
        key: String,
    },
}

/// A stack input: a key and where its value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterBinding {
    /// The template parameter name.
    pub key: String,
    /// The value source.
    pub value: BindingValue,
}

impl ParameterBinding {
    /// Binds a parameter to a literal value.
    #[must_use]
    pub fn literal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: BindingValue::Literal(value.into()),
        }
    }

    /// Binds a parameter to another stack's output.
    #[must_use]
    pub fn output(key: impl Into<String>, stack: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: BindingValue::Output {
                stack: stack.into(),
                key: output_key.into(),
            },
        }
    }

    /// Returns the referenced stack, if this binding reads an output.
    #[must_use]
    pub fn source_stack(&self) -> Option<&str> {
        match &self.value {
            BindingValue::Output { stack, .. } => Some(stack),
            BindingValue::Literal(_) => None,
        }
    }
}

/// Everything needed to apply one stack. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStackSpec")]
pub struct StackSpec {
    name: String,
    region: Region,
    template: TemplateHandle,
    bindings: Vec<ParameterBinding>,
    capabilities: Vec<Capability>,
}

#[derive(Deserialize)]
struct RawStackSpec {
    name: String,
    region: Region,
    template: TemplateHandle,
    #[serde(default)]
    bindings: Vec<ParameterBinding>,
    #[serde(default)]
    capabilities: Vec<Capability>,
}

impl TryFrom<RawStackSpec> for StackSpec {
    type Error = ConfigError;

    fn try_from(raw: RawStackSpec) -> Result<Self, Self::Error> {
        let builder = raw
            .bindings
            .into_iter()
            .fold(Self::builder(raw.name, raw.region, raw.template)?, StackSpecBuilder::binding);
        Ok(raw
            .capabilities
            .into_iter()
            .fold(builder, StackSpecBuilder::capability)
            .build())
    }
}

impl StackSpec {
    /// Starts building a stack specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name violates the provider naming rules.
    pub fn builder(
        name: impl Into<String>,
        region: Region,
        template: TemplateHandle,
    ) -> Result<StackSpecBuilder, ConfigError> {
        let name = name.into();
        validate_stack_name(&name)?;
        Ok(StackSpecBuilder {
            spec: Self {
                name,
                region,
                template,
                bindings: Vec::new(),
                capabilities: Vec::new(),
            },
        })
    }

    /// Returns the stack name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the target region.
    #[must_use]
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Returns the template handle.
    #[must_use]
    pub fn template(&self) -> &TemplateHandle {
        &self.template
    }

    /// Returns the parameter bindings in declaration order.
    #[must_use]
    pub fn bindings(&self) -> &[ParameterBinding] {
        &self.bindings
    }

    /// Returns the required capabilities, sorted and deduplicated.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Returns the names of stacks whose outputs this stack reads.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().filter_map(ParameterBinding::source_stack)
    }
}

/// Builder for [`StackSpec`].
#[derive(Debug, Clone)]
pub struct StackSpecBuilder {
    spec: StackSpec,
}

impl StackSpecBuilder {
    /// Adds a parameter binding.
    #[must_use]
    pub fn binding(mut self, binding: ParameterBinding) -> Self {
        self.spec.bindings.push(binding);
        self
    }

    /// Adds a literal parameter.
    #[must_use]
    pub fn literal(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.binding(ParameterBinding::literal(key, value))
    }

    /// Adds a parameter bound to another stack's output.
    #[must_use]
    pub fn output_ref(
        self,
        key: impl Into<String>,
        stack: impl Into<String>,
        output_key: impl Into<String>,
    ) -> Self {
        self.binding(ParameterBinding::output(key, stack, output_key))
    }

    /// Requires a capability.
    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.spec.capabilities.push(capability);
        self
    }

    /// Finishes the specification.
    #[must_use]
    pub fn build(mut self) -> StackSpec {
        self.spec.capabilities.sort_unstable();
        self.spec.capabilities.dedup();
        self.spec
    }
}
