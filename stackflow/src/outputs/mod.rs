//! Stack output lookup and the per-run output table.
//!
//! Everything here is a pure function of data already fetched from the
//! provider; nothing in this module performs I/O.

use crate::core::Outputs;
use crate::errors::MissingOutputError;
use crate::plan::{BindingValue, StackSpec};
use crate::provider::{Parameter, StackDescription};
use std::collections::HashMap;

/// Extracts named outputs from a stack description.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputResolver;

impl OutputResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Looks up one output. If the provider lists a key twice, the first
    /// entry wins.
    ///
    /// # Errors
    ///
    /// Returns `MissingOutputError` if the description has no such output.
    pub fn resolve<'a>(
        &self,
        description: &'a StackDescription,
        key: &str,
    ) -> Result<&'a str, MissingOutputError> {
        description
            .outputs
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.value.as_str())
            .ok_or_else(|| MissingOutputError::new(&description.name, key))
    }

    /// Collects every output of a description, first entry winning on
    /// duplicate keys.
    #[must_use]
    pub fn resolve_all(&self, description: &StackDescription) -> Outputs {
        let mut outputs = Outputs::new();
        for output in &description.outputs {
            if outputs.contains_key(&output.key) {
                continue;
            }
            if let Ok(value) = self.resolve(description, &output.key) {
                outputs.insert(output.key.clone(), value.to_string());
            }
        }
        outputs
    }
}

/// Outputs of the stacks applied so far in one run.
///
/// Only successful lifecycle outcomes are merged, so a lookup never sees a
/// stack that failed or has not run yet.
#[derive(Debug, Clone, Default)]
pub struct OutputTable {
    stacks: HashMap<String, Outputs>,
}

impl OutputTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stack's outputs, replacing anything recorded earlier for it.
    pub fn merge(&mut self, stack: impl Into<String>, outputs: Outputs) {
        self.stacks.insert(stack.into(), outputs);
    }

    /// Returns the outputs recorded for a stack.
    #[must_use]
    pub fn outputs(&self, stack: &str) -> Option<&Outputs> {
        self.stacks.get(stack)
    }

    /// Looks up one output of a stack.
    ///
    /// # Errors
    ///
    /// Returns `MissingOutputError` if the stack has no recorded outputs or
    /// lacks the key.
    pub fn lookup(&self, stack: &str, key: &str) -> Result<&str, MissingOutputError> {
        self.stacks
            .get(stack)
            .and_then(|outputs| outputs.get(key))
            .map(String::as_str)
            .ok_or_else(|| MissingOutputError::new(stack, key))
    }

    /// Resolves a spec's bindings into concrete parameters, in declaration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns the first `MissingOutputError` encountered.
    pub fn resolve_bindings(&self, spec: &StackSpec) -> Result<Vec<Parameter>, MissingOutputError> {
        spec.bindings()
            .iter()
            .map(|binding| {
                let value = match &binding.value {
                    BindingValue::Literal(value) => value.clone(),
                    BindingValue::Output { stack, key } => self.lookup(stack, key)?.to_string(),
                };
                Ok(Parameter::new(binding.key.clone(), value))
            })
            .collect()
    }

    /// Returns the number of stacks recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}
