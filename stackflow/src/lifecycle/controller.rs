//! Per-stack lifecycle: create, recreate or update a stack until it
//! reaches a terminal status.

use super::poller::{PollConfig, PollEnd, StatusPoller};
use super::retry::{with_retry, RetryConfig};
use crate::cancellation::CancellationToken;
use crate::core::{Outcome, StackState, StackStatus};
use crate::errors::{DeployFailure, ProviderError, ProviderErrorKind};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::outputs::OutputResolver;
use crate::plan::StackSpec;
use crate::provider::{CloudProviderClient, Parameter, ProviderOp, StackDescription, StackRequest};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives one stack to a terminal state.
///
/// Remote state is re-derived with `describe` on every invocation, so
/// calling [`ensure`](Self::ensure) twice with an unchanged spec yields
/// `Succeeded` and then `NoChange`.
pub struct StackLifecycleController {
    poll: PollConfig,
    retry: RetryConfig,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
    in_flight: DashMap<String, DateTime<Utc>>,
}

impl std::fmt::Debug for StackLifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackLifecycleController")
            .field("poll", &self.poll)
            .field("retry", &self.retry)
            .field("cancel", &self.cancel)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl Default for StackLifecycleController {
    fn default() -> Self {
        Self::new(PollConfig::default(), RetryConfig::default())
    }
}

/// Removes a stack from the in-flight registry when dropped.
struct InFlight<'a> {
    registry: &'a DashMap<String, DateTime<Utc>>,
    stack: &'a str,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.registry.remove(self.stack);
    }
}

impl StackLifecycleController {
    /// Creates a controller with the given polling and retry settings.
    #[must_use]
    pub fn new(poll: PollConfig, retry: RetryConfig) -> Self {
        Self {
            poll,
            retry,
            events: Arc::new(NoOpEventSink),
            cancel: CancellationToken::new(),
            in_flight: DashMap::new(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the cancellation token observed while waiting.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns true if an `ensure` for `stack` is currently running.
    #[must_use]
    pub fn is_in_flight(&self, stack: &str) -> bool {
        self.in_flight.contains_key(stack)
    }

    /// Brings `spec`'s stack to a terminal state using already resolved
    /// `parameters`.
    ///
    /// Absent stacks are created; stacks in `ROLLBACK_COMPLETE` or
    /// `DELETE_FAILED` are deleted and recreated; anything else is updated.
    pub async fn ensure(
        &self,
        client: &dyn CloudProviderClient,
        spec: &StackSpec,
        parameters: Vec<Parameter>,
    ) -> Outcome {
        let stack = spec.name();

        let _guard = match self.in_flight.entry(stack.to_string()) {
            Entry::Occupied(_) => {
                warn!(stack, "Lifecycle operation already in flight");
                return self.finish(
                    stack,
                    Outcome::failed(DeployFailure::StackBusy {
                        stack: stack.to_string(),
                    }),
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                InFlight {
                    registry: &self.in_flight,
                    stack,
                }
            }
        };

        let request = StackRequest {
            name: stack.to_string(),
            template: spec.template().clone(),
            parameters,
            capabilities: spec.capabilities().to_vec(),
        };

        let outcome = match self.apply(client, &request).await {
            Ok(outcome) => outcome,
            Err(failure) => Outcome::failed(failure),
        };
        self.finish(stack, outcome)
    }

    async fn apply(
        &self,
        client: &dyn CloudProviderClient,
        request: &StackRequest,
    ) -> Result<Outcome, DeployFailure> {
        let stack = request.name.as_str();
        if self.cancel.is_cancelled() {
            return Err(self.cancelled(stack));
        }

        let mut current = match self.call(stack, || client.describe(stack)).await {
            Ok(description) => Some(description),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(self.provider_failure(err)),
        };

        if let Some(description) = current.as_ref().filter(|d| d.status.is_in_progress()) {
            info!(stack, status = %description.status, "Waiting for in-flight operation to settle");
            current = match self.poller(client).wait(stack, |s| !s.is_in_progress()).await? {
                PollEnd::Settled(description) => Some(description),
                PollEnd::Gone => None,
            };
        }

        let state = StackState::classify(current.as_ref().map(|d| &d.status));
        match state {
            StackState::Absent => self.create(client, request).await,
            StackState::RecoverableFailed(status) => {
                warn!(stack, %status, "Stack is in a recoverable failed state; recreating");
                self.delete(client, stack).await?;
                self.create(client, request).await
            }
            StackState::Stable(status) => {
                let description = current.unwrap_or_else(|| StackDescription::new(stack, status));
                self.update(client, request, &description).await
            }
            // `wait` only settles on statuses that are not in progress.
            StackState::InProgress(status) => Err(DeployFailure::TerminalStatus {
                stack: stack.to_string(),
                status,
            }),
        }
    }

    async fn create(
        &self,
        client: &dyn CloudProviderClient,
        request: &StackRequest,
    ) -> Result<Outcome, DeployFailure> {
        let stack = request.name.as_str();
        info!(stack, "Creating stack");
        self.action(stack, ProviderOp::Create);
        self.call(stack, || client.create(request))
            .await
            .map_err(|err| self.provider_failure(err))?;
        self.await_apply(client, stack).await
    }

    async fn update(
        &self,
        client: &dyn CloudProviderClient,
        request: &StackRequest,
        current: &StackDescription,
    ) -> Result<Outcome, DeployFailure> {
        let stack = request.name.as_str();
        info!(stack, status = %current.status, "Updating stack");
        self.action(stack, ProviderOp::Update);

        match self.call(stack, || client.update(request)).await {
            Ok(()) => self.await_apply(client, stack).await,
            Err(err) => match err.kind {
                ProviderErrorKind::NoUpdates => {
                    info!(stack, "No updates to be performed");
                    Ok(Outcome::no_change(OutputResolver::new().resolve_all(current)))
                }
                ProviderErrorKind::NotFound => {
                    warn!(stack, "Stack disappeared before update; creating it");
                    self.create(client, request).await
                }
                _ => Err(self.provider_failure(err)),
            },
        }
    }

    async fn delete(&self, client: &dyn CloudProviderClient, stack: &str) -> Result<(), DeployFailure> {
        info!(stack, "Deleting stack");
        self.action(stack, ProviderOp::Delete);
        self.call(stack, || client.delete(stack))
            .await
            .map_err(|err| self.provider_failure(err))?;

        // A stale pre-delete status may still be reported; only the delete's
        // own terminal statuses end the wait early.
        let deleted = |s: &StackStatus| matches!(s, StackStatus::DeleteFailed | StackStatus::DeleteComplete);
        match self.poller(client).wait(stack, deleted).await? {
            PollEnd::Gone => {
                info!(stack, "Stack deleted");
                Ok(())
            }
            PollEnd::Settled(d) if d.status == StackStatus::DeleteComplete => {
                info!(stack, "Stack deleted");
                Ok(())
            }
            PollEnd::Settled(d) => Err(DeployFailure::DeleteFailed {
                stack: stack.to_string(),
                status: d.status,
            }),
        }
    }

    /// Polls a create or update to its terminal status. Outputs come from
    /// the terminal describe.
    async fn await_apply(&self, client: &dyn CloudProviderClient, stack: &str) -> Result<Outcome, DeployFailure> {
        match self.poller(client).wait(stack, StackStatus::is_terminal).await? {
            PollEnd::Settled(d) if d.status.is_success() => {
                Ok(Outcome::succeeded(OutputResolver::new().resolve_all(&d)))
            }
            PollEnd::Settled(d) => Err(DeployFailure::TerminalStatus {
                stack: stack.to_string(),
                status: d.status,
            }),
            PollEnd::Gone => Err(DeployFailure::Vanished {
                stack: stack.to_string(),
            }),
        }
    }

    async fn call<T, F, Fut>(&self, stack: &str, operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        with_retry(&self.retry, stack, &self.cancel, ProviderError::is_transient, operation).await
    }

    fn poller<'a>(&'a self, client: &'a dyn CloudProviderClient) -> StatusPoller<'a> {
        StatusPoller {
            client,
            poll: &self.poll,
            retry: &self.retry,
            cancel: &self.cancel,
            events: self.events.as_ref(),
        }
    }

    fn provider_failure(&self, err: ProviderError) -> DeployFailure {
        if self.cancel.is_cancelled() {
            self.cancelled(&err.stack)
        } else {
            err.into()
        }
    }

    fn cancelled(&self, stack: &str) -> DeployFailure {
        DeployFailure::Cancelled {
            stack: stack.to_string(),
            reason: self.cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
        }
    }

    fn action(&self, stack: &str, op: ProviderOp) {
        self.events.emit(
            events::STACK_ACTION,
            Some(serde_json::json!({ "stack": stack, "action": op.to_string() })),
        );
    }

    fn finish(&self, stack: &str, outcome: Outcome) -> Outcome {
        match &outcome {
            Outcome::Failed { reason } => {
                warn!(stack, failure = reason.label(), "Stack deployment failed: {reason}");
                self.events.emit(
                    events::STACK_FAILED,
                    Some(serde_json::json!({ "stack": stack, "failure": reason })),
                );
            }
            other => {
                info!(stack, outcome = other.label(), "Stack deployment finished");
                self.events.emit(
                    events::STACK_COMPLETED,
                    Some(serde_json::json!({ "stack": stack, "outcome": other.label() })),
                );
            }
        }
        outcome
    }
}
