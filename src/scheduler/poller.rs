//! Polls a submitted job until it reaches a terminal state.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace};

use super::retry::RetryPolicy;
use crate::client::{JobApi, JobHandle, JobStatus};
use crate::error::JobError;
use crate::ratelimit::RateLimiter;

/// Default pause between status queries, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Repeatedly queries a job's status address.
///
/// There is no cap on the number of polls: the remote service is trusted to
/// reach `succeeded` or `failed` eventually. Callers that need a deadline
/// wrap [`JobStatusPoller::poll_until_done`] in `tokio::time::timeout`.
#[derive(Clone)]
pub struct JobStatusPoller {
    api: Arc<dyn JobApi>,
    limiter: Option<Arc<RateLimiter>>,
    retry: RetryPolicy,
    interval: Duration,
}

impl JobStatusPoller {
    pub fn new(api: Arc<dyn JobApi>) -> Self {
        Self {
            api,
            limiter: None,
            retry: RetryPolicy::default(),
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    /// Gates every status query through `limiter`.
    pub fn with_limiter(mut self, limiter: Option<Arc<RateLimiter>>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Retry policy applied to each individual status query.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Polls until the job succeeds, returning the full status payload.
    ///
    /// # Errors
    ///
    /// - [`JobError::RemoteJobFailed`] when the job reports `failed`
    /// - any error of a status query that survives the retry policy
    pub async fn poll_until_done(&self, handle: &JobHandle) -> Result<Value, JobError> {
        let mut polls = 0u64;
        loop {
            polls += 1;
            let status = self
                .retry
                .run("status", || async move {
                    if let Some(limiter) = &self.limiter {
                        limiter.acquire().await;
                    }
                    self.api.status(handle).await
                })
                .await?;

            match status {
                JobStatus::Succeeded(payload) => {
                    debug!(job_id = %handle.job_id, polls, "Job succeeded");
                    return Ok(payload);
                }
                JobStatus::Failed(detail) => {
                    debug!(job_id = %handle.job_id, polls, detail = %detail, "Job failed");
                    return Err(JobError::RemoteJobFailed { detail });
                }
                JobStatus::InProgress(state) => {
                    trace!(job_id = %handle.job_id, state = %state, polls, "Job in progress");
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}
