//! Scripted provider client for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::core::{Outputs, StackStatus};
use crate::errors::ProviderError;
use crate::provider::{CloudProviderClient, ProviderCall, ProviderOp, StackDescription, StackRequest};

#[derive(Debug, Default)]
struct Script {
    describes: HashMap<String, VecDeque<Result<StackStatus, ProviderError>>>,
    outputs: HashMap<String, Outputs>,
    creates: HashMap<String, VecDeque<Result<(), ProviderError>>>,
    updates: HashMap<String, VecDeque<Result<(), ProviderError>>>,
    deletes: HashMap<String, VecDeque<Result<(), ProviderError>>>,
    calls: Vec<ProviderCall>,
    requests: Vec<StackRequest>,
}

/// A provider client that replays scripted responses and records every call.
///
/// Describe responses are consumed in order; the last one repeats. A stack
/// with no scripted describes is reported as not found. Mutating calls
/// succeed unless a result was queued for them.
#[derive(Debug, Default)]
pub struct RecordingProvider {
    script: Mutex<Script>,
}

impl RecordingProvider {
    /// Creates a provider with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the describe responses for a stack.
    #[must_use]
    pub fn with_describes(
        self,
        stack: impl Into<String>,
        responses: Vec<Result<StackStatus, ProviderError>>,
    ) -> Self {
        self.script
            .lock()
            .describes
            .insert(stack.into(), responses.into());
        self
    }

    /// Sets the outputs reported by every successful describe of a stack.
    #[must_use]
    pub fn with_outputs(self, stack: impl Into<String>, outputs: Outputs) -> Self {
        self.script.lock().outputs.insert(stack.into(), outputs);
        self
    }

    /// Queues the result of the next create of a stack.
    #[must_use]
    pub fn with_create_result(self, stack: impl Into<String>, result: Result<(), ProviderError>) -> Self {
        self.script
            .lock()
            .creates
            .entry(stack.into())
            .or_default()
            .push_back(result);
        self
    }

    /// Queues the result of the next update of a stack.
    #[must_use]
    pub fn with_update_result(self, stack: impl Into<String>, result: Result<(), ProviderError>) -> Self {
        self.script
            .lock()
            .updates
            .entry(stack.into())
            .or_default()
            .push_back(result);
        self
    }

    /// Queues the result of the next delete of a stack.
    #[must_use]
    pub fn with_delete_result(self, stack: impl Into<String>, result: Result<(), ProviderError>) -> Self {
        self.script
            .lock()
            .deletes
            .entry(stack.into())
            .or_default()
            .push_back(result);
        self
    }

    /// Returns every call received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.script.lock().calls.clone()
    }

    /// Returns the operations issued against one stack, in order.
    #[must_use]
    pub fn ops(&self, stack: &str) -> Vec<ProviderOp> {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|c| c.stack == stack)
            .map(|c| c.op)
            .collect()
    }

    /// Returns how many times `op` was issued against `stack`.
    #[must_use]
    pub fn count(&self, op: ProviderOp, stack: &str) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|c| c.op == op && c.stack == stack)
            .count()
    }

    /// Returns the create and update requests received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<StackRequest> {
        self.script.lock().requests.clone()
    }

    fn next_mutation(
        queue: &mut HashMap<String, VecDeque<Result<(), ProviderError>>>,
        stack: &str,
    ) -> Result<(), ProviderError> {
        queue
            .get_mut(stack)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(()))
    }
}

#[async_trait]
impl CloudProviderClient for RecordingProvider {
    async fn describe(&self, name: &str) -> Result<StackDescription, ProviderError> {
        let mut script = self.script.lock();
        script.calls.push(ProviderCall::new(ProviderOp::Describe, name));

        let response = match script.describes.get_mut(name) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match response {
            Some(Ok(status)) => {
                let outputs = script.outputs.get(name).cloned().unwrap_or_default();
                Ok(StackDescription::new(name, status).with_outputs(&outputs))
            }
            Some(Err(err)) => Err(err),
            None => Err(ProviderError::not_found(name)),
        }
    }

    async fn create(&self, request: &StackRequest) -> Result<(), ProviderError> {
        let mut script = self.script.lock();
        script.calls.push(ProviderCall::new(ProviderOp::Create, &request.name));
        script.requests.push(request.clone());
        Self::next_mutation(&mut script.creates, &request.name)
    }

    async fn update(&self, request: &StackRequest) -> Result<(), ProviderError> {
        let mut script = self.script.lock();
        script.calls.push(ProviderCall::new(ProviderOp::Update, &request.name));
        script.requests.push(request.clone());
        Self::next_mutation(&mut script.updates, &request.name)
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        let mut script = self.script.lock();
        script.calls.push(ProviderCall::new(ProviderOp::Delete, name));
        Self::next_mutation(&mut script.deletes, name)
    }
}
