//! batchforge: batch orchestration for asynchronous remote generation jobs.
//!
//! A batch starts as a handful of parameter strings with bracketed option
//! lists. [`variation`] expands them into an ordered task matrix,
//! [`scheduler`] runs the tasks on a bounded worker pool under a shared
//! [`ratelimit`] window, polls each remote job to completion and gives every
//! failed task one more attempt, and [`template`] decides where each result
//! is written.
//!
//! The remote service sits behind the [`client::JobApi`] trait; concrete
//! request shapes live in [`operations`].

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod operations;
pub mod ratelimit;
pub mod scheduler;
pub mod template;
pub mod variation;

pub use config::{BatchConfig, ConfigError};
pub use error::{AuthError, FailureKind, JobError, VariationError};
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use scheduler::{BatchReport, DispatchConfig, TaskDispatcher, TaskOutcome, WorkUnit};
pub use variation::{TaskMatrix, TaskSpec, VariationInputs};
