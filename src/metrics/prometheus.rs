//! Prometheus metrics registration and export.
//!
//! All metrics live in one registry created by [`init_metrics`]. Until it
//! has been called every recording call is a no-op.

use prometheus::{CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all batchforge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Remote submission attempts, labeled by operation and outcome.
pub static SUBMISSIONS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Local retries, labeled by reason (throttled, transient, transport).
pub static RETRIES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Final task outcomes, labeled by status and failure kind.
pub static TASKS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Work-unit duration in seconds, labeled by operation.
pub static TASK_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Number of work units currently executing.
pub static ACTIVE_WORKERS: OnceLock<Gauge> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Safe to call more than once; later calls leave the first registry in place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if a metric cannot be created or registered.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let submissions_total = CounterVec::new(
        Opts::new("batchforge_submissions_total", "Remote job submission attempts"),
        &["operation", "outcome"],
    )?;

    let retries_total = CounterVec::new(
        Opts::new("batchforge_retries_total", "Local retries of remote calls"),
        &["reason"],
    )?;

    let tasks_total = CounterVec::new(
        Opts::new("batchforge_tasks_total", "Completed work units"),
        &["status", "failure"],
    )?;

    let task_duration = HistogramVec::new(
        HistogramOpts::new(
            "batchforge_task_duration_seconds",
            "Work unit duration in seconds",
        )
        .buckets(vec![5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["operation"],
    )?;

    let active_workers = Gauge::new(
        "batchforge_active_workers",
        "Number of work units currently executing",
    )?;

    registry.register(Box::new(submissions_total.clone()))?;
    registry.register(Box::new(retries_total.clone()))?;
    registry.register(Box::new(tasks_total.clone()))?;
    registry.register(Box::new(task_duration.clone()))?;
    registry.register(Box::new(active_workers.clone()))?;

    // Already-set statics mean a previous call won; keep those.
    let _ = REGISTRY.set(registry);
    let _ = SUBMISSIONS_TOTAL.set(submissions_total);
    let _ = RETRIES_TOTAL.set(retries_total);
    let _ = TASKS_TOTAL.set(tasks_total);
    let _ = TASK_DURATION.set(task_duration);
    let _ = ACTIVE_WORKERS.set(active_workers);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead if metrics were never initialized or
/// encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
