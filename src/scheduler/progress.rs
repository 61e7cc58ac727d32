//! Running batch counters and a background monitor that logs them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

/// Default interval between progress log lines, in seconds.
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 30;

/// Snapshot of batch progress at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Work units started, retry pass included.
    pub dispatched: usize,
    /// Work units that finished successfully.
    pub succeeded: usize,
    /// Work units that finished with an error.
    pub failed: usize,
    /// Tasks resubmitted by the retry pass.
    pub retried: usize,
    /// Retried tasks that then succeeded.
    pub recovered: usize,
    /// Work units currently executing.
    pub in_flight: usize,
    pub elapsed: Duration,
}

/// Shared atomic counters updated by workers.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounters {
    pub dispatched: Arc<AtomicUsize>,
    pub succeeded: Arc<AtomicUsize>,
    pub failed: Arc<AtomicUsize>,
    pub retried: Arc<AtomicUsize>,
    pub recovered: Arc<AtomicUsize>,
    pub in_flight: Arc<AtomicUsize>,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a snapshot of the current counter values.
    pub fn snapshot(&self, start: Instant) -> ProgressSnapshot {
        ProgressSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            elapsed: start.elapsed(),
        }
    }
}

/// A background task that periodically logs batch progress.
///
/// Call [`ProgressMonitor::stop`] when the batch is done; dropping the
/// monitor also stops it at its next tick.
pub struct ProgressMonitor {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressMonitor {
    /// Start a monitor over `total` tasks that logs every `interval`.
    pub fn start(counters: ProgressCounters, total: usize, interval: Duration) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = stop_flag.clone();
        let start = Instant::now();

        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.tick().await; // skip the immediate first tick

            loop {
                tick.tick().await;
                if flag.load(Ordering::Relaxed) {
                    break;
                }

                let snap = counters.snapshot(start);
                let done = snap.succeeded + snap.failed;
                let pct = if total > 0 {
                    (done as f64 / total as f64 * 100.0).min(100.0)
                } else {
                    0.0
                };

                tracing::info!(
                    dispatched = snap.dispatched,
                    succeeded = snap.succeeded,
                    failed = snap.failed,
                    retried = snap.retried,
                    recovered = snap.recovered,
                    in_flight = snap.in_flight,
                    total = total,
                    progress_pct = format!("{:.1}%", pct),
                    elapsed_secs = snap.elapsed.as_secs(),
                    "Batch progress"
                );
            }
        });

        Self {
            stop_flag,
            handle: Some(handle),
        }
    }

    /// Stop the monitor and wait for its task to end.
    pub async fn stop(mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_counters_default() {
        let snap = ProgressCounters::new().snapshot(Instant::now());
        assert_eq!(snap.dispatched, 0);
        assert_eq!(snap.succeeded, 0);
        assert_eq!(snap.failed, 0);
        assert_eq!(snap.in_flight, 0);
    }

    #[test]
    fn test_progress_counters_clone_shares_state() {
        let counters = ProgressCounters::new();
        let clone = counters.clone();

        counters.succeeded.fetch_add(2, Ordering::Relaxed);
        counters.recovered.fetch_add(1, Ordering::Relaxed);

        let snap = clone.snapshot(Instant::now());
        assert_eq!(snap.succeeded, 2);
        assert_eq!(snap.recovered, 1);
    }

    #[tokio::test]
    async fn test_progress_monitor_start_stop() {
        let counters = ProgressCounters::new();
        counters.dispatched.fetch_add(3, Ordering::Relaxed);

        let monitor = ProgressMonitor::start(counters, 10, Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(120)).await;
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_stop_does_not_wait_for_next_tick() {
        let monitor = ProgressMonitor::start(ProgressCounters::new(), 1, Duration::from_secs(3600));
        tokio::time::timeout(Duration::from_secs(5), monitor.stop())
            .await
            .expect("stop should return promptly");
    }
}
