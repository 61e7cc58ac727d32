//! Prometheus metrics for batch runs.
//!
//! ```ignore
//! use batchforge::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics()?;
//! MetricsCollector::new().record_retry("throttled");
//! std::fs::write("metrics.prom", export_metrics())?;
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use self::prometheus::{export_metrics, init_metrics};

pub use self::prometheus::{
    ACTIVE_WORKERS, REGISTRY, RETRIES_TOTAL, SUBMISSIONS_TOTAL, TASKS_TOTAL, TASK_DURATION,
};
