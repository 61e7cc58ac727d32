//! Local retry of remote calls inside one work unit.
//!
//! A 429 waits a fixed cool-down before resubmitting. A 5xx or transport
//! error backs off exponentially from `base_delay`. Each kind has its own
//! attempt budget; any other error is returned at once.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::JobError;
use crate::metrics::MetricsCollector;

/// Default wait after a 429, in seconds.
pub const DEFAULT_THROTTLE_COOLDOWN_SECS: u64 = 70;

/// Default number of 429 retries per call.
pub const DEFAULT_MAX_THROTTLE_RETRIES: u32 = 3;

/// Default first back-off delay for 5xx and transport errors, in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Default number of 5xx / transport retries per call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Longest exponential back-off step.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Retry limits for one remote call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed wait after a 429 response.
    pub throttle_cooldown: Duration,
    /// Retries allowed after 429 responses.
    pub max_throttle_retries: u32,
    /// First back-off delay for 5xx and transport errors; doubles per retry.
    pub base_delay: Duration,
    /// Retries allowed after 5xx and transport errors.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            throttle_cooldown: Duration::from_secs(DEFAULT_THROTTLE_COOLDOWN_SECS),
            max_throttle_retries: DEFAULT_MAX_THROTTLE_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_throttle_retries: 0,
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_throttle_cooldown(mut self, cooldown: Duration) -> Self {
        self.throttle_cooldown = cooldown;
        self
    }

    pub fn with_max_throttle_retries(mut self, retries: u32) -> Self {
        self.max_throttle_retries = retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Back-off before the `retry`-th transient retry (1-based):
    /// `base`, `2 * base`, `4 * base`, ... capped at five minutes.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }

    /// Upper bound on calls made by one [`RetryPolicy::run`].
    pub fn max_attempts(&self) -> u32 {
        1 + self.max_throttle_retries + self.max_retries
    }

    /// Runs `call` until it succeeds, fails with a non-retryable error, or
    /// exhausts the budget for the kind of error it keeps returning.
    ///
    /// `call` is invoked afresh for every attempt; `label` only names the call
    /// site in logs.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, JobError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, JobError>>,
    {
        let metrics = MetricsCollector::new();
        let mut throttle_retries = 0u32;
        let mut transient_retries = 0u32;

        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let retry = match &err {
                JobError::ProviderThrottled { .. } if throttle_retries < self.max_throttle_retries => {
                    throttle_retries += 1;
                    Some((self.throttle_cooldown, "throttled"))
                }
                JobError::ProviderTransient { .. } | JobError::Transport(_)
                    if transient_retries < self.max_retries =>
                {
                    transient_retries += 1;
                    Some((self.backoff_delay(transient_retries), "transient"))
                }
                _ => None,
            };

            let Some((delay, reason)) = retry else {
                if err.is_retryable() {
                    warn!(
                        call = label,
                        throttle_retries,
                        transient_retries,
                        error = %err,
                        "Retry budget exhausted"
                    );
                } else {
                    debug!(call = label, error = %err, "Non-retryable error");
                }
                return Err(err);
            };

            metrics.record_retry(reason);
            warn!(
                call = label,
                reason,
                attempt = throttle_retries + transient_retries + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying remote call"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
