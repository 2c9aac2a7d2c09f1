//! In-process provider that models remote stack status transitions.
//!
//! Every mutating call puts the stack into the matching `*_IN_PROGRESS`
//! status; it settles after a configurable number of describe calls.
//! Used by the CLI for local runs and by scenario tests.

use super::{CloudProviderClient, Parameter, ProviderCall, ProviderOp, StackDescription, StackRequest};
use crate::core::{Outputs, StackStatus};
use crate::errors::ProviderError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
struct Pending {
    remaining: u32,
    settles_to: StackStatus,
}

#[derive(Debug, Clone)]
struct SimStack {
    status: StackStatus,
    pending: Option<Pending>,
    fingerprint: Option<String>,
    parameters: Vec<Parameter>,
    outputs: Outputs,
}

#[derive(Debug, Default)]
struct SimState {
    stacks: HashMap<String, SimStack>,
    exports: HashMap<String, Outputs>,
    fail_next_apply: HashSet<String>,
    stuck_deletes: HashSet<String>,
    calls: Vec<ProviderCall>,
}

/// A simulated provider holding all stacks in memory.
#[derive(Debug, Default)]
pub struct SimulatedCloud {
    settle_after: u32,
    state: Mutex<SimState>,
}

impl SimulatedCloud {
    /// Creates a provider whose operations settle on the first describe.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many describe calls report the in-progress status before an
    /// operation settles.
    #[must_use]
    pub fn with_settle_after(mut self, polls: u32) -> Self {
        self.settle_after = polls;
        self
    }

    /// Declares the outputs a stack exposes after each successful apply.
    #[must_use]
    pub fn with_exports(self, stack: impl Into<String>, outputs: Outputs) -> Self {
        self.state.lock().exports.insert(stack.into(), outputs);
        self
    }

    /// Seeds an existing stack in a settled status.
    #[must_use]
    pub fn with_stack(self, stack: impl Into<String>, status: StackStatus) -> Self {
        let stack = stack.into();
        let outputs = self.state.lock().exports.get(&stack).cloned().unwrap_or_default();
        self.state.lock().stacks.insert(
            stack,
            SimStack {
                status,
                pending: None,
                fingerprint: None,
                parameters: Vec::new(),
                outputs,
            },
        );
        self
    }

    /// Makes the next create or update of `stack` roll back.
    pub fn fail_next_apply(&self, stack: impl Into<String>) {
        self.state.lock().fail_next_apply.insert(stack.into());
    }

    /// Makes deletes of `stack` settle in `DELETE_FAILED`.
    pub fn fail_deletes(&self, stack: impl Into<String>) {
        self.state.lock().stuck_deletes.insert(stack.into());
    }

    /// Returns the current status of a stack without counting as a poll.
    #[must_use]
    pub fn status_of(&self, stack: &str) -> Option<StackStatus> {
        self.state.lock().stacks.get(stack).map(|s| s.status.clone())
    }

    /// Returns every call received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().calls.clone()
    }

    /// Returns how many times `op` was issued against `stack`.
    #[must_use]
    pub fn count(&self, op: ProviderOp, stack: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.op == op && c.stack == stack)
            .count()
    }

    fn start(state: &mut SimState, stack: &str, status: StackStatus, settles_to: StackStatus, settle_after: u32) -> SimStack {
        let mut sim = state.stacks.remove(stack).unwrap_or_else(|| SimStack {
            status: status.clone(),
            pending: None,
            fingerprint: None,
            parameters: Vec::new(),
            outputs: Outputs::new(),
        });
        sim.status = status;
        sim.pending = Some(Pending {
            remaining: settle_after,
            settles_to,
        });
        sim
    }
}

#[async_trait]
impl CloudProviderClient for SimulatedCloud {
    async fn describe(&self, name: &str) -> Result<StackDescription, ProviderError> {
        let mut state = self.state.lock();
        state.calls.push(ProviderCall::new(ProviderOp::Describe, name));

        let exports = state.exports.get(name).cloned().unwrap_or_default();
        let Some(stack) = state.stacks.get_mut(name) else {
            return Err(ProviderError::not_found(name));
        };

        if let Some(pending) = stack.pending.as_mut() {
            if pending.remaining > 0 {
                pending.remaining -= 1;
            } else {
                stack.status = pending.settles_to.clone();
                stack.pending = None;
                if stack.status.is_success() {
                    stack.outputs = exports;
                }
            }
        }

        if stack.status == StackStatus::DeleteComplete {
            state.stacks.remove(name);
            return Err(ProviderError::not_found(name));
        }

        Ok(StackDescription::new(name, stack.status.clone()).with_outputs(&stack.outputs))
    }

    async fn create(&self, request: &StackRequest) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        state.calls.push(ProviderCall::new(ProviderOp::Create, &request.name));

        if state.stacks.contains_key(&request.name) {
            return Err(ProviderError::already_exists(&request.name));
        }

        let settles_to = if state.fail_next_apply.remove(&request.name) {
            StackStatus::RollbackComplete
        } else {
            StackStatus::CreateComplete
        };
        let mut sim = Self::start(
            &mut state,
            &request.name,
            StackStatus::CreateInProgress,
            settles_to,
            self.settle_after,
        );
        sim.fingerprint = Some(request.template.fingerprint());
        sim.parameters.clone_from(&request.parameters);
        state.stacks.insert(request.name.clone(), sim);
        Ok(())
    }

    async fn update(&self, request: &StackRequest) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        state.calls.push(ProviderCall::new(ProviderOp::Update, &request.name));

        let fingerprint = request.template.fingerprint();
        match state.stacks.get(&request.name) {
            None => return Err(ProviderError::not_found(&request.name)),
            Some(s) if s.pending.is_some() || s.status.is_in_progress() => {
                return Err(ProviderError::rejected(
                    &request.name,
                    format!("Stack is in {} state and can not be updated", s.status),
                ));
            }
            Some(s) if s.fingerprint.as_deref() == Some(fingerprint.as_str()) && s.parameters == request.parameters => {
                return Err(ProviderError::no_updates(&request.name));
            }
            Some(_) => {}
        }

        let settles_to = if state.fail_next_apply.remove(&request.name) {
            StackStatus::UpdateRollbackComplete
        } else {
            StackStatus::UpdateComplete
        };
        let mut sim = Self::start(
            &mut state,
            &request.name,
            StackStatus::UpdateInProgress,
            settles_to,
            self.settle_after,
        );
        sim.fingerprint = Some(fingerprint);
        sim.parameters.clone_from(&request.parameters);
        state.stacks.insert(request.name.clone(), sim);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        state.calls.push(ProviderCall::new(ProviderOp::Delete, name));

        if !state.stacks.contains_key(name) {
            return Ok(());
        }

        let settles_to = if state.stuck_deletes.contains(name) {
            StackStatus::DeleteFailed
        } else {
            StackStatus::DeleteComplete
        };
        let sim = Self::start(&mut state, name, StackStatus::DeleteInProgress, settles_to, self.settle_after);
        state.stacks.insert(name.to_string(), sim);
        Ok(())
    }
}
