//! Bounded, cancellable status polling.

use super::retry::{with_retry, RetryConfig};
use crate::cancellation::CancellationToken;
use crate::core::StackStatus;
use crate::errors::{ConfigError, DeployFailure, ProviderError};
use crate::events::{self, EventSink};
use crate::provider::{CloudProviderClient, StackDescription};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Polling cadence and bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between status queries in milliseconds.
    pub interval_ms: u64,
    /// Maximum number of status queries per wait.
    pub max_attempts: u32,
    /// Optional overall time limit per wait in milliseconds.
    pub deadline_ms: Option<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            max_attempts: 360,
            deadline_ms: None,
        }
    }
}

impl PollConfig {
    /// Creates the default poll config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Sets the maximum number of queries.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets an overall deadline.
    #[must_use]
    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Returns the poll interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Checks that the bounds can terminate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPoll` if `max_attempts` or the deadline
    /// is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidPoll("max_attempts must be at least 1".to_string()));
        }
        if self.deadline_ms == Some(0) {
            return Err(ConfigError::InvalidPoll("deadline_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollEnd {
    /// A describe returned a status accepted by the predicate.
    Settled(StackDescription),
    /// The provider reported the stack does not exist.
    Gone,
}

/// Polls one stack until a predicate accepts its status.
pub(crate) struct StatusPoller<'a> {
    pub(crate) client: &'a dyn CloudProviderClient,
    pub(crate) poll: &'a PollConfig,
    pub(crate) retry: &'a RetryConfig,
    pub(crate) cancel: &'a CancellationToken,
    pub(crate) events: &'a dyn EventSink,
}

impl StatusPoller<'_> {
    /// Describes `stack` every interval until `done` accepts the status or
    /// the stack disappears. No provider call is issued after that.
    pub(crate) async fn wait(
        &self,
        stack: &str,
        done: impl Fn(&StackStatus) -> bool,
    ) -> Result<PollEnd, DeployFailure> {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(stack));
            }

            attempts += 1;
            let described = with_retry(self.retry, stack, self.cancel, ProviderError::is_transient, || {
                self.client.describe(stack)
            })
            .await;

            let description = match described {
                Ok(description) => description,
                Err(err) if err.is_not_found() => {
                    debug!(stack, attempt = attempts, "Stack no longer exists");
                    self.events.emit(
                        events::STACK_POLL,
                        Some(serde_json::json!({ "stack": stack, "attempt": attempts, "status": null })),
                    );
                    return Ok(PollEnd::Gone);
                }
                Err(_) if self.cancel.is_cancelled() => return Err(self.cancelled(stack)),
                Err(err) => return Err(err.into()),
            };

            debug!(stack, attempt = attempts, status = %description.status, "Current stack status");
            self.events.emit(
                events::STACK_POLL,
                Some(serde_json::json!({
                    "stack": stack,
                    "attempt": attempts,
                    "status": description.status.as_str(),
                })),
            );

            if done(&description.status) {
                return Ok(PollEnd::Settled(description));
            }

            let waited = started.elapsed();
            let past_deadline = self
                .poll
                .deadline_ms
                .is_some_and(|limit| waited >= Duration::from_millis(limit));
            if attempts >= self.poll.max_attempts || past_deadline {
                return Err(DeployFailure::Timeout {
                    stack: stack.to_string(),
                    attempts,
                    waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                });
            }

            tokio::select! {
                () = tokio::time::sleep(self.poll.interval()) => {}
                () = self.cancel.cancelled() => return Err(self.cancelled(stack)),
            }
        }
    }

    fn cancelled(&self, stack: &str) -> DeployFailure {
        DeployFailure::Cancelled {
            stack: stack.to_string(),
            reason: self.cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::provider::{ProviderOp, SimulatedCloud};
    use crate::testing::RecordingProvider;

    fn poller<'a>(
        client: &'a dyn CloudProviderClient,
        poll: &'a PollConfig,
        retry: &'a RetryConfig,
        cancel: &'a CancellationToken,
        events: &'a dyn EventSink,
    ) -> StatusPoller<'a> {
        StatusPoller {
            client,
            poll,
            retry,
            cancel,
            events,
        }
    }

    #[test]
    fn test_poll_config_validate() {
        assert!(PollConfig::default().validate().is_ok());
        assert!(PollConfig::new().with_max_attempts(0).validate().is_err());
        assert!(PollConfig::new().with_deadline_ms(0).validate().is_err());
        assert_eq!(PollConfig::default().interval(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_first_terminal_status() {
        let provider = RecordingProvider::new().with_describes(
            "web",
            vec![
                Ok(StackStatus::CreateInProgress),
                Ok(StackStatus::CreateInProgress),
                Ok(StackStatus::CreateComplete),
                Ok(StackStatus::UpdateInProgress),
            ],
        );
        let (poll, retry, cancel, sink) = (
            PollConfig::new(),
            RetryConfig::disabled(),
            CancellationToken::new(),
            CollectingEventSink::new(),
        );

        let end = poller(&provider, &poll, &retry, &cancel, &sink)
            .wait("web", StackStatus::is_terminal)
            .await
            .unwrap();

        match end {
            PollEnd::Settled(d) => assert_eq!(d.status, StackStatus::CreateComplete),
            PollEnd::Gone => panic!("expected a settled stack"),
        }
        assert_eq!(provider.count(ProviderOp::Describe, "web"), 3);
        assert_eq!(sink.events_of_type("stack.poll").len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_ends_wait() {
        let cloud = SimulatedCloud::new();
        let (poll, retry, cancel, sink) = (
            PollConfig::new(),
            RetryConfig::disabled(),
            CancellationToken::new(),
            CollectingEventSink::new(),
        );

        let end = poller(&cloud, &poll, &retry, &cancel, &sink)
            .wait("ghost", StackStatus::is_terminal)
            .await
            .unwrap();
        assert_eq!(end, PollEnd::Gone);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_max_attempts() {
        let provider = RecordingProvider::new()
            .with_describes("web", vec![Ok(StackStatus::UpdateInProgress)]);
        let poll = PollConfig::new().with_interval_ms(1000).with_max_attempts(4);
        let (retry, cancel, sink) = (
            RetryConfig::disabled(),
            CancellationToken::new(),
            CollectingEventSink::new(),
        );

        let err = poller(&provider, &poll, &retry, &cancel, &sink)
            .wait("web", StackStatus::is_terminal)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DeployFailure::Timeout {
                stack: "web".to_string(),
                attempts: 4,
                waited_ms: 3000,
            }
        );
        assert_eq!(provider.count(ProviderOp::Describe, "web"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_deadline() {
        let provider = RecordingProvider::new()
            .with_describes("web", vec![Ok(StackStatus::UpdateInProgress)]);
        let poll = PollConfig::new().with_interval_ms(1000).with_deadline_ms(2500);
        let (retry, cancel, sink) = (
            RetryConfig::disabled(),
            CancellationToken::new(),
            CollectingEventSink::new(),
        );

        let err = poller(&provider, &poll, &retry, &cancel, &sink)
            .wait("web", StackStatus::is_terminal)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployFailure::Timeout { attempts: 4, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let provider = RecordingProvider::new()
            .with_describes("web", vec![Ok(StackStatus::CreateInProgress)]);
        let (poll, retry, cancel, sink) = (
            PollConfig::new(),
            RetryConfig::disabled(),
            CancellationToken::new(),
            CollectingEventSink::new(),
        );

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(25_000)).await;
            trigger.cancel("operator interrupt");
        });

        let err = poller(&provider, &poll, &retry, &cancel, &sink)
            .wait("web", StackStatus::is_terminal)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DeployFailure::Cancelled {
                stack: "web".to_string(),
                reason: "operator interrupt".to_string(),
            }
        );
        assert_eq!(provider.count(ProviderOp::Describe, "web"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_describe_is_retried() {
        let provider = RecordingProvider::new().with_describes(
            "web",
            vec![
                Err(ProviderError::transient("web", "Rate exceeded")),
                Ok(StackStatus::CreateComplete),
            ],
        );
        let poll = PollConfig::new();
        let retry = RetryConfig::new()
            .with_base_delay_ms(10)
            .with_jitter(crate::lifecycle::JitterStrategy::None);
        let (cancel, sink) = (CancellationToken::new(), CollectingEventSink::new());

        let end = poller(&provider, &poll, &retry, &cancel, &sink)
            .wait("web", StackStatus::is_terminal)
            .await
            .unwrap();

        assert!(matches!(end, PollEnd::Settled(_)));
        assert_eq!(provider.count(ProviderOp::Describe, "web"), 2);
    }
}
