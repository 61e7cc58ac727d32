//! Sliding-window admission control for outbound API calls.
//!
//! [`RateLimiter::acquire`] admits at most `max_calls` calls in any trailing
//! `period`, and spaces consecutive admissions at least `min_delay` apart.
//! The limiter knows nothing about what it guards; the same instance can gate
//! job submissions and, optionally, status polls.
//!
//! State lives behind one mutex that is held only to purge, check and record.
//! Waiting happens outside the lock, and a woken caller re-validates the
//! window before it is admitted.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Limits applied by a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum admissions inside any trailing `period`.
    pub max_calls: usize,
    /// Length of the sliding window.
    pub period: Duration,
    /// Minimum spacing between consecutive admissions; zero disables it.
    pub min_delay: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 5,
            period: Duration::from_secs(60),
            min_delay: Duration::ZERO,
        }
    }
}

impl RateLimitConfig {
    /// Creates a window of `max_calls` per `period` with no minimum spacing.
    pub fn new(max_calls: usize, period: Duration) -> Self {
        Self {
            max_calls,
            period,
            min_delay: Duration::ZERO,
        }
    }

    /// Sets the minimum spacing between admissions.
    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }
}

/// Admission history guarded by the limiter's lock.
#[derive(Debug, Default)]
struct RateLimiterState {
    /// Admission instants newer than `now - period`, oldest first.
    calls: VecDeque<Instant>,
    last_admission: Option<Instant>,
}

impl RateLimiterState {
    fn purge(&mut self, now: Instant, period: Duration) {
        while let Some(&oldest) = self.calls.front() {
            if now.duration_since(oldest) >= period {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }

    /// How long the caller must wait before it may be admitted at `now`.
    fn required_wait(&self, now: Instant, config: &RateLimitConfig) -> Option<Duration> {
        let mut wait = Duration::ZERO;

        if self.calls.len() >= config.max_calls {
            if let Some(&oldest) = self.calls.front() {
                wait = wait.max(config.period.saturating_sub(now.duration_since(oldest)));
            }
        }

        if let Some(last) = self.last_admission {
            let since_last = now.duration_since(last);
            if since_last < config.min_delay {
                wait = wait.max(config.min_delay - since_last);
            }
        }

        (!wait.is_zero()).then_some(wait)
    }

    fn record(&mut self, now: Instant) {
        self.calls.push_back(now);
        self.last_admission = Some(now);
    }
}

/// Thread-safe sliding-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<RateLimiterState>,
}

impl RateLimiter {
    /// Creates a limiter. A `max_calls` of zero is treated as one.
    pub fn new(config: RateLimitConfig) -> Self {
        let config = RateLimitConfig {
            max_calls: config.max_calls.max(1),
            ..config
        };
        Self {
            config,
            state: Mutex::new(RateLimiterState::default()),
        }
    }

    /// Creates a limiter of `max_calls` per `period`.
    pub fn per_period(max_calls: usize, period: Duration) -> Self {
        Self::new(RateLimitConfig::new(max_calls, period))
    }

    /// The limits this limiter enforces.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Waits until an admission is allowed, records it, and returns the
    /// instant of admission.
    pub async fn acquire(&self) -> Instant {
        let mut waited = Duration::ZERO;
        loop {
            let wait = {
                let mut state = self.lock_state();
                let now = Instant::now();
                state.purge(now, self.config.period);
                match state.required_wait(now, &self.config) {
                    None => {
                        state.record(now);
                        if !waited.is_zero() {
                            debug!(
                                waited_ms = waited.as_millis() as u64,
                                in_window = state.calls.len(),
                                "Rate limiter admitted call after waiting"
                            );
                        }
                        return now;
                    }
                    Some(wait) => wait,
                }
            };

            tokio::time::sleep(wait).await;
            waited += wait;
        }
    }

    /// Number of admissions inside the current window.
    #[cfg(test)]
    fn in_window(&self) -> usize {
        let mut state = self.lock_state();
        state.purge(Instant::now(), self.config.period);
        state.calls.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, RateLimiterState> {
        // The state is a plain list of instants; a panic mid-update cannot
        // leave it inconsistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
