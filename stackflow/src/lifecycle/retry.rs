//! Bounded retry of single provider calls.
//!
//! Only errors the caller classifies as retryable are repeated; the delay
//! between attempts follows the configured backoff and jitter strategies.

use crate::cancellation::CancellationToken;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^retry
    #[default]
    Exponential,
    /// delay = base * (retry + 1)
    Linear,
    /// delay = base
    Constant,
}

/// Jitter strategy to spread out concurrent retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
    /// min(max, random(base, prev * 3))
    Decorrelated,
}

/// Configuration for retrying transient provider errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Jitter strategy.
    pub jitter: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff: BackoffStrategy::Exponential,
            jitter: JitterStrategy::Full,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that never repeats a call.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Sets the total attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }

    /// Computes the delay before retry number `retry` (0-based).
    ///
    /// `previous_ms` is the last delay used, consulted only by decorrelated
    /// jitter.
    #[must_use]
    pub fn delay_for(&self, retry: u32, previous_ms: Option<u64>) -> Duration {
        let base = self.base_delay_ms;
        let max = self.max_delay_ms;

        let delay = match self.backoff {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(retry)),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(retry) + 1),
            BackoffStrategy::Constant => base,
        }
        .min(max);

        let mut rng = rand::thread_rng();
        let jittered = match self.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full if delay == 0 => 0,
            JitterStrategy::Full => rng.gen_range(0..=delay),
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rng.gen_range(0..=half)
                }
            }
            JitterStrategy::Decorrelated => {
                let upper = previous_ms.unwrap_or(base).saturating_mul(3).min(max);
                if upper <= base {
                    base
                } else {
                    rng.gen_range(base..=upper)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error,
/// exhausts `config.max_attempts`, or `cancel` fires during a backoff wait.
///
/// The last error is returned in every failure case.
pub async fn with_retry<T, E, F, Fut, P>(
    config: &RetryConfig,
    key: &str,
    cancel: &CancellationToken,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 1;
    let mut previous_ms = None;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) || attempt >= config.max_attempts {
            return Err(err);
        }

        let delay = config.delay_for(attempt - 1, previous_ms);
        previous_ms = Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
        tracing::debug!(
            key,
            attempt,
            delay_ms = previous_ms,
            error = %err,
            "Retrying after transient error"
        );

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => return Err(err),
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30000);
        assert_eq!(config.backoff, BackoffStrategy::Exponential);
        assert_eq!(config.jitter, JitterStrategy::Full);
    }

    #[test]
    fn test_max_attempts_never_zero() {
        assert_eq!(RetryConfig::new().with_max_attempts(0).max_attempts, 1);
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
    }

    #[test]
    fn test_delay_exponential_no_jitter() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_jitter(JitterStrategy::None);

        assert_eq!(config.delay_for(0, None), Duration::from_millis(100));
        assert_eq!(config.delay_for(1, None), Duration::from_millis(200));
        assert_eq!(config.delay_for(2, None), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_linear_and_constant() {
        let linear = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Linear)
            .with_jitter(JitterStrategy::None);
        assert_eq!(linear.delay_for(2, None), Duration::from_millis(300));

        let constant = linear.with_backoff(BackoffStrategy::Constant);
        assert_eq!(constant.delay_for(5, None), Duration::from_millis(100));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig::new()
            .with_base_delay_ms(1000)
            .with_max_delay_ms(5000)
            .with_jitter(JitterStrategy::None);
        assert_eq!(config.delay_for(10, None), Duration::from_millis(5000));
    }

    #[test]
    fn test_full_jitter_bounded() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Constant);
        for _ in 0..20 {
            assert!(config.delay_for(0, None) <= Duration::from_millis(100));
        }
    }

    #[test]
    fn test_decorrelated_jitter_bounded() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_max_delay_ms(1000)
            .with_jitter(JitterStrategy::Decorrelated);
        for _ in 0..20 {
            let delay = config.delay_for(3, Some(200));
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(600));
        }
    }

    fn fast() -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(3)
            .with_base_delay_ms(1)
            .with_jitter(JitterStrategy::None)
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, String> = with_retry(&fast(), "k", &CancellationToken::new(), |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_after_retryable_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, String> = with_retry(&fast(), "k", &CancellationToken::new(), |_| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(format!("attempt {n}"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<i32, String> = with_retry(&fast(), "k", &CancellationToken::new(), |_| true, move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err("always fails".to_string()) }
        })
        .await;

        assert_eq!(result, Err("always fails".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, String> = with_retry(&fast(), "k", &CancellationToken::new(), |_| false, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("fatal".to_string()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_retrying() {
        let config = fast().with_base_delay_ms(60_000);
        let token = CancellationToken::new();
        token.cancel("operator interrupt");

        let calls = AtomicU32::new(0);
        let result: Result<i32, String> = with_retry(&config, "k", &token, |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("busy".to_string()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
