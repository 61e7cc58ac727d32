//! Seams between the scheduling core and the remote service.

use std::path::Path;

use async_trait::async_trait;

use super::types::{JobHandle, JobStatus, SubmitRequest};
use crate::error::JobError;

/// Remote asynchronous job API.
///
/// Implementations perform exactly one network call per method; retries and
/// rate limiting are applied by the caller.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Submits a job and returns its handle.
    async fn submit(&self, request: &SubmitRequest) -> Result<JobHandle, JobError>;

    /// Queries the current status of a submitted job.
    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, JobError>;

    /// Streams the artifact at `url` into `destination`, returning the number
    /// of bytes written.
    async fn download(&self, url: &str, destination: &Path) -> Result<u64, JobError>;
}

/// Makes a local input file reachable by the remote service.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Uploads `path` and returns the URL the remote service should fetch.
    async fn upload(&self, path: &Path) -> Result<String, JobError>;
}

/// Whether `reference` already names a remote resource.
pub fn is_remote_reference(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}
