//! Batch scheduling: bounded dispatch, status polling and local retry.
//!
//! - **TaskDispatcher**: runs a task list through a bounded pool of work units,
//!   followed by exactly one retry pass over failures
//! - **JobStatusPoller**: polls a submitted job until `succeeded` or `failed`
//! - **RetryPolicy**: in-unit retry of 429 (fixed cool-down) and 5xx /
//!   transport errors (exponential back-off)
//! - **ProgressMonitor**: periodic progress log while a batch runs
//!
//! # Architecture
//!
//! ```text
//!     TaskMatrix ──► TaskDispatcher (≤ concurrency units at once)
//!                          │
//!          ┌───────────────┼───────────────┐
//!          ▼               ▼               ▼
//!     ┌─────────┐     ┌─────────┐     ┌─────────┐
//!     │ Unit #0 │     │ Unit #1 │     │ Unit #N │
//!     └────┬────┘     └────┬────┘     └────┬────┘
//!          │  RateLimiter.acquire ─► submit (RetryPolicy)
//!          │  JobStatusPoller ─► download ─► TaskOutcome
//!          ▼
//!     initial pass ─► failed set ─► single retry pass ─► BatchReport
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use batchforge::scheduler::{DispatchConfig, TaskDispatcher};
//! use std::sync::Arc;
//!
//! let dispatcher = TaskDispatcher::new(DispatchConfig::new(5));
//! let report = dispatcher.run(matrix.into_tasks(), Arc::new(unit)).await;
//! println!("Completed {} of {} tasks successfully", report.succeeded, report.total);
//! ```

pub mod dispatcher;
pub mod job;
pub mod poller;
pub mod progress;
pub mod retry;

pub use dispatcher::{DispatchConfig, TaskDispatcher, WorkUnit, DEFAULT_CONCURRENCY};
pub use job::{BatchReport, TaskOutcome};
pub use poller::{JobStatusPoller, DEFAULT_POLL_INTERVAL_SECS};
pub use progress::{ProgressCounters, ProgressMonitor, ProgressSnapshot};
pub use retry::RetryPolicy;
