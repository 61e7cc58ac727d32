//! Per-task outcomes and the aggregated batch report.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FailureKind, JobError};
use crate::variation::TaskSpec;

/// Result of one work unit for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Sequence number of the task; outcomes are addressed by it.
    pub sequence: usize,
    pub task: TaskSpec,
    pub success: bool,
    /// Written artifact, on success.
    pub output_path: Option<PathBuf>,
    /// Error message, on failure.
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    /// 1 for the initial pass, 2 for the retry pass.
    pub attempt: u32,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl TaskOutcome {
    pub fn success(task: TaskSpec, output_path: PathBuf, attempt: u32, elapsed: Duration) -> Self {
        Self {
            sequence: task.sequence,
            task,
            success: true,
            output_path: Some(output_path),
            error: None,
            failure: None,
            attempt,
            duration_ms: elapsed.as_millis() as u64,
            completed_at: Utc::now(),
        }
    }

    pub fn failure(task: TaskSpec, error: &JobError, attempt: u32, elapsed: Duration) -> Self {
        Self {
            sequence: task.sequence,
            task,
            success: false,
            output_path: None,
            error: Some(error.to_string()),
            failure: Some(error.failure_kind()),
            attempt,
            duration_ms: elapsed.as_millis() as u64,
            completed_at: Utc::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Aggregate of a whole batch after the retry pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Tasks resubmitted by the retry pass.
    pub retried: usize,
    /// Retried tasks that succeeded on the second pass.
    pub recovered: usize,
    pub duration_ms: u64,
    /// One outcome per task, ordered by sequence number.
    pub outcomes: Vec<TaskOutcome>,
}

impl BatchReport {
    /// Builds a report, sorting `outcomes` by sequence number.
    pub fn new(
        started_at: DateTime<Utc>,
        mut outcomes: Vec<TaskOutcome>,
        retried: usize,
        elapsed: Duration,
    ) -> Self {
        outcomes.sort_by_key(|o| o.sequence);
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let recovered = outcomes
            .iter()
            .filter(|o| o.success && o.attempt > 1)
            .count();

        Self {
            batch_id: Uuid::new_v4(),
            started_at,
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            retried,
            recovered,
            duration_ms: elapsed.as_millis() as u64,
            outcomes,
        }
    }

    /// Whether every task succeeded.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64
    }

    /// The outcome of the task with `sequence`.
    pub fn outcome(&self, sequence: usize) -> Option<&TaskOutcome> {
        self.outcomes
            .binary_search_by_key(&sequence, |o| o.sequence)
            .ok()
            .map(|index| &self.outcomes[index])
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }
}
