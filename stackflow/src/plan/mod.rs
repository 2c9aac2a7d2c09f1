//! Deployment plans.
//!
//! This module provides:
//! - Stack specifications with literal and output-reference bindings
//! - An ordered, validated deployment plan
//! - The standard certificate → website → pipeline chain

mod chain;
mod spec;

pub use chain::{TemplateSet, CERTIFICATE_ARN, DISTRIBUTION_ID, ROOT_BUCKET_NAME};
pub use spec::{
    validate_stack_name, BindingValue, Capability, ParameterBinding, StackSpec, StackSpecBuilder,
    TemplateHandle,
};

use crate::core::Region;
use crate::errors::PlanValidationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// An ordered chain of stacks. Order is dependency order and is never
/// rearranged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPlan")]
pub struct DeploymentPlan {
    name: String,
    stacks: Vec<StackSpec>,
}

#[derive(Deserialize)]
struct RawPlan {
    name: String,
    stacks: Vec<StackSpec>,
}

impl TryFrom<RawPlan> for DeploymentPlan {
    type Error = PlanValidationError;

    fn try_from(raw: RawPlan) -> Result<Self, Self::Error> {
        let mut builder = DeploymentPlanBuilder::new(raw.name);
        for spec in raw.stacks {
            builder.add_stack(spec)?;
        }
        builder.build()
    }
}

impl DeploymentPlan {
    /// Starts building a plan.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> DeploymentPlanBuilder {
        DeploymentPlanBuilder::new(name)
    }

    /// Returns the plan name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stacks in execution order.
    #[must_use]
    pub fn stacks(&self) -> &[StackSpec] {
        &self.stacks
    }

    /// Returns the number of stacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// Returns true if the plan has no stacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Returns the distinct regions the plan deploys into.
    #[must_use]
    pub fn regions(&self) -> BTreeSet<&Region> {
        self.stacks.iter().map(StackSpec::region).collect()
    }
}

/// Builder for creating validated plans.
#[derive(Debug, Clone)]
pub struct DeploymentPlanBuilder {
    name: String,
    stacks: Vec<StackSpec>,
    names: HashSet<String>,
}

impl DeploymentPlanBuilder {
    /// Creates a new plan builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stacks: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Appends a stack to the chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already in the plan, or if a binding
    /// references the stack itself or a stack not added before it.
    pub fn stack(mut self, spec: StackSpec) -> Result<Self, PlanValidationError> {
        self.add_stack(spec)?;
        Ok(self)
    }

    /// Appends a stack to the chain in place.
    ///
    /// # Errors
    ///
    /// See [`DeploymentPlanBuilder::stack`].
    pub fn add_stack(&mut self, spec: StackSpec) -> Result<(), PlanValidationError> {
        if self.names.contains(spec.name()) {
            return Err(PlanValidationError::new(
                "PLAN-002-DUPLICATE",
                format!("Stack '{}' appears more than once in plan '{}'", spec.name(), self.name),
            )
            .with_stacks(vec![spec.name().to_string()])
            .with_fix_hint("Each stack may be applied at most once per run."));
        }

        for dep in spec.dependencies() {
            if dep == spec.name() {
                return Err(PlanValidationError::new(
                    "PLAN-003-SELF_REFERENCE",
                    format!("Stack '{}' binds a parameter to its own output", spec.name()),
                )
                .with_stacks(vec![spec.name().to_string()]));
            }
            if !self.names.contains(dep) {
                return Err(PlanValidationError::new(
                    "PLAN-004-FORWARD_REFERENCE",
                    format!(
                        "Stack '{}' reads outputs of '{}', which is not applied before it",
                        spec.name(),
                        dep
                    ),
                )
                .with_stacks(vec![spec.name().to_string(), dep.to_string()])
                .with_fix_hint("Add the source stack earlier in the plan."));
            }
        }

        self.names.insert(spec.name().to_string());
        self.stacks.push(spec);
        Ok(())
    }

    /// Returns the number of stacks added so far.
    #[must_use]
    pub fn stack_count(&self) -> usize {
        self.stacks.len()
    }

    /// Builds the plan.
    ///
    /// # Errors
    ///
    /// Returns an error if no stacks were added.
    pub fn build(self) -> Result<DeploymentPlan, PlanValidationError> {
        if self.stacks.is_empty() {
            return Err(PlanValidationError::new(
                "PLAN-001-EMPTY",
                format!("Plan '{}' has no stacks", self.name),
            )
            .with_fix_hint("Add at least one stack before building."));
        }

        Ok(DeploymentPlan {
            name: self.name,
            stacks: self.stacks,
        })
    }
}
