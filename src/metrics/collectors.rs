//! Recording helpers over the raw Prometheus metrics.

use std::time::Duration;

use super::prometheus::{
    ACTIVE_WORKERS, RETRIES_TOTAL, SUBMISSIONS_TOTAL, TASKS_TOTAL, TASK_DURATION,
};

/// Records batchforge operational metrics.
///
/// Cheap to copy around; every method does nothing until
/// [`init_metrics`](super::init_metrics) has run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record one submission attempt.
    ///
    /// `outcome` is `accepted` or the failure kind label.
    pub fn record_submission(&self, operation: &str, outcome: &str) {
        if let Some(submissions) = SUBMISSIONS_TOTAL.get() {
            submissions.with_label_values(&[operation, outcome]).inc();
        }
    }

    /// Record one local retry.
    pub fn record_retry(&self, reason: &str) {
        if let Some(retries) = RETRIES_TOTAL.get() {
            retries.with_label_values(&[reason]).inc();
        }
        tracing::trace!(reason = reason, "Recorded retry metric");
    }

    /// Record a finished work unit.
    ///
    /// `failure` is empty for successful units.
    pub fn record_task(&self, operation: &str, status: &str, failure: &str, duration: Duration) {
        if let Some(tasks_total) = TASKS_TOTAL.get() {
            tasks_total.with_label_values(&[status, failure]).inc();
        }

        if let Some(task_duration) = TASK_DURATION.get() {
            task_duration
                .with_label_values(&[operation])
                .observe(duration.as_secs_f64());
        }

        tracing::trace!(
            operation = operation,
            status = status,
            duration_secs = duration.as_secs_f64(),
            "Recorded task metric"
        );
    }

    pub fn inc_active_workers(&self) {
        if let Some(active_workers) = ACTIVE_WORKERS.get() {
            active_workers.inc();
        }
    }

    pub fn dec_active_workers(&self) {
        if let Some(active_workers) = ACTIVE_WORKERS.get() {
            active_workers.dec();
        }
    }
}
