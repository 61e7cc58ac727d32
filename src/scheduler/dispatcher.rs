//! Bounded-concurrency dispatch of a task matrix with one retry pass.
//!
//! Every task runs as one [`WorkUnit`] invocation on its own tokio task.
//! At most `concurrency` units run at once; permits are taken in sequence
//! order, so tasks start in the order the matrix produced them while
//! finishing in any order. Errors never escape a unit: each becomes a failed
//! [`TaskOutcome`], and a panic is caught at the join and recorded the same
//! way.
//!
//! After the initial pass, the eligible failures are run exactly once more
//! through the same bounded pool. Together with the local retry inside each
//! unit, this bounds remote submissions to two per task plus the local retry
//! budget.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::job::{BatchReport, TaskOutcome};
use super::progress::{ProgressCounters, ProgressMonitor};
use crate::error::{FailureKind, JobError};
use crate::metrics::MetricsCollector;
use crate::variation::TaskSpec;

/// Default number of simultaneous work units.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// The full per-task pipeline: submit, poll, download.
#[async_trait]
pub trait WorkUnit: Send + Sync + 'static {
    /// Label used in logs and metrics.
    fn name(&self) -> &str {
        "task"
    }

    /// Runs `task` to completion and returns the written artifact path.
    async fn execute(&self, task: &TaskSpec) -> Result<PathBuf, JobError>;
}

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Maximum simultaneous work units.
    pub concurrency: usize,
    /// Run the single retry pass over failed tasks.
    pub retry_failed: bool,
    /// Include remote `failed` jobs in the retry pass.
    pub retry_remote_failures: bool,
    /// Interval of the background progress log; `None` disables it.
    pub progress_interval: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry_failed: true,
            retry_remote_failures: true,
            progress_interval: None,
        }
    }
}

impl DispatchConfig {
    /// Creates a config with the given concurrency (at least one).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            ..Self::default()
        }
    }

    pub fn with_retry_failed(mut self, enabled: bool) -> Self {
        self.retry_failed = enabled;
        self
    }

    pub fn with_retry_remote_failures(mut self, enabled: bool) -> Self {
        self.retry_remote_failures = enabled;
        self
    }

    pub fn with_progress_interval(mut self, interval: Option<Duration>) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Whether a failed outcome goes into the retry pass.
    pub fn is_retry_eligible(&self, outcome: &TaskOutcome) -> bool {
        if outcome.success || !self.retry_failed {
            return false;
        }
        self.retry_remote_failures || outcome.failure != Some(FailureKind::RemoteJobFailed)
    }
}

/// Decrements the in-flight counters when a unit ends, panics included.
struct InFlightGuard {
    counters: ProgressCounters,
    metrics: MetricsCollector,
}

impl InFlightGuard {
    fn enter(counters: &ProgressCounters, metrics: MetricsCollector) -> Self {
        counters.in_flight.fetch_add(1, Ordering::Relaxed);
        metrics.inc_active_workers();
        Self {
            counters: counters.clone(),
            metrics,
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.metrics.dec_active_workers();
    }
}

/// Runs task lists through a bounded pool of work units.
pub struct TaskDispatcher {
    config: DispatchConfig,
    counters: ProgressCounters,
    metrics: MetricsCollector,
}

impl TaskDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        let config = DispatchConfig {
            concurrency: config.concurrency.max(1),
            ..config
        };
        Self {
            config,
            counters: ProgressCounters::new(),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Live counters, shared with any clone handed out.
    pub fn counters(&self) -> ProgressCounters {
        self.counters.clone()
    }

    /// Runs every task, then one retry pass over eligible failures.
    ///
    /// The report holds exactly one outcome per input task, sorted by
    /// sequence number.
    pub async fn run<W: WorkUnit>(&self, tasks: Vec<TaskSpec>, unit: Arc<W>) -> BatchReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let total = tasks.len();

        let monitor = self
            .config
            .progress_interval
            .map(|interval| ProgressMonitor::start(self.counters.clone(), total, interval));

        info!(
            tasks = total,
            concurrency = self.config.concurrency,
            operation = unit.name(),
            "Dispatching batch"
        );

        // Indexed by input position; sequence numbers are not assumed unique.
        let mut outcomes = self.run_pass(tasks, &unit, 1).await;

        let retry_positions: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| self.config.is_retry_eligible(outcome))
            .map(|(position, _)| position)
            .collect();
        let retried = retry_positions.len();

        if retried > 0 {
            let succeeded = outcomes.iter().filter(|o| o.success).count();
            info!(
                succeeded,
                failed = total - succeeded,
                retrying = retried,
                "Initial pass complete, retrying failed tasks"
            );
            self.counters.retried.fetch_add(retried, Ordering::Relaxed);
            self.counters.failed.fetch_sub(retried, Ordering::Relaxed);

            let retry_tasks = retry_positions
                .iter()
                .map(|&position| outcomes[position].task.clone())
                .collect();
            let retry_outcomes = self.run_pass(retry_tasks, &unit, 2).await;
            for (position, outcome) in retry_positions.into_iter().zip(retry_outcomes) {
                outcomes[position] = outcome;
            }
        }

        if let Some(monitor) = monitor {
            monitor.stop().await;
        }

        let report = BatchReport::new(
            started_at,
            outcomes,
            retried,
            start.elapsed(),
        );

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            retried = report.retried,
            recovered = report.recovered,
            elapsed_secs = start.elapsed().as_secs(),
            "Batch complete"
        );

        report
    }

    /// One pass over `tasks`. Returns one outcome per task.
    async fn run_pass<W: WorkUnit>(
        &self,
        tasks: Vec<TaskSpec>,
        unit: &Arc<W>,
        attempt: u32,
    ) -> Vec<TaskOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            // A closed semaphore is never produced here; without a permit the
            // unit still runs.
            let permit = Arc::clone(&semaphore).acquire_owned().await.ok();
            let unit = Arc::clone(unit);
            let counters = self.counters.clone();
            let metrics = self.metrics;
            let spawned = task.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                execute_one(unit.as_ref(), spawned, attempt, &counters, metrics).await
            });
            handles.push((task, handle));
        }

        let (tasks, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = futures::future::join_all(handles).await;

        tasks
            .into_iter()
            .zip(results)
            .map(|(task, result)| match result {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    let err = JobError::Panicked(join_err.to_string());
                    warn!(
                        sequence = task.sequence,
                        attempt,
                        task = %task,
                        error = %err,
                        "Work unit panicked"
                    );
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    TaskOutcome::failure(task, &err, attempt, Duration::ZERO)
                }
            })
            .collect()
    }
}

async fn execute_one<W: WorkUnit + ?Sized>(
    unit: &W,
    task: TaskSpec,
    attempt: u32,
    counters: &ProgressCounters,
    metrics: MetricsCollector,
) -> TaskOutcome {
    let _guard = InFlightGuard::enter(counters, metrics);
    counters.dispatched.fetch_add(1, Ordering::Relaxed);
    let start = Instant::now();
    debug!(sequence = task.sequence, attempt, task = %task, "Starting work unit");

    let result = unit.execute(&task).await;
    let elapsed = start.elapsed();

    match result {
        Ok(path) => {
            counters.succeeded.fetch_add(1, Ordering::Relaxed);
            if attempt > 1 {
                counters.recovered.fetch_add(1, Ordering::Relaxed);
            }
            metrics.record_task(unit.name(), "success", "", elapsed);
            info!(
                sequence = task.sequence,
                attempt,
                path = %path.display(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Task succeeded"
            );
            TaskOutcome::success(task, path, attempt, elapsed)
        }
        Err(err) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            let kind = err.failure_kind();
            metrics.record_task(unit.name(), "failure", kind.as_str(), elapsed);
            warn!(
                sequence = task.sequence,
                attempt,
                failure = kind.as_str(),
                task = %task,
                error = %err,
                "Task failed"
            );
            TaskOutcome::failure(task, &err, attempt, elapsed)
        }
    }
}
