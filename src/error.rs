//! Error types for batchforge operations.
//!
//! Defines the error taxonomy for every stage of a batch run:
//! - Variation expansion (fatal before any remote call is made)
//! - Remote job submission, polling and artifact download
//! - Output path resolution on the local filesystem
//! - Authentication and reference uploads

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while expanding parameter strings into a task matrix.
///
/// These abort the whole batch before dispatch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VariationError {
    #[error("Invalid variation count {count} for '{parameter}': must be between {min} and {max}")]
    InvalidVariationCount {
        parameter: String,
        count: u32,
        min: u32,
        max: u32,
    },

    #[error("Empty variation list in '{parameter}' (block at byte {position})")]
    EmptyVariationAxis { parameter: String, position: usize },

    #[error("Invalid parameter value for '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },
}

/// Errors raised by a single task's work unit.
///
/// The dispatcher converts every one of these into a failed `TaskOutcome`;
/// they never stop sibling tasks.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Remote job failed: {detail}")]
    RemoteJobFailed { detail: String },

    #[error("Provider throttled the request (429): {message}")]
    ProviderThrottled { message: String },

    #[error("Provider error ({status}): {message}")]
    ProviderTransient { status: u16, message: String },

    #[error("Provider rejected the request ({status}): {message}")]
    ProviderRejected { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Local IO error for '{}': {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload of '{}' failed: {reason}", path.display())]
    Upload { path: PathBuf, reason: String },

    #[error("Work unit panicked: {0}")]
    Panicked(String),
}

impl JobError {
    /// Builds the error matching an unsuccessful HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => JobError::ProviderThrottled { message },
            500..=599 => JobError::ProviderTransient { status, message },
            _ => JobError::ProviderRejected { status, message },
        }
    }

    /// Wraps an IO error with the path it concerns.
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JobError::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Whether a work unit may retry this error locally before giving up.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobError::ProviderThrottled { .. }
                | JobError::ProviderTransient { .. }
                | JobError::Transport(_)
        )
    }

    /// Coarse classification recorded on the task outcome.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            JobError::RemoteJobFailed { .. } => FailureKind::RemoteJobFailed,
            JobError::ProviderThrottled { .. } => FailureKind::ProviderThrottled,
            JobError::ProviderTransient { .. } => FailureKind::ProviderTransient,
            JobError::ProviderRejected { .. } => FailureKind::ProviderRejected,
            JobError::Transport(_) => FailureKind::Transport,
            JobError::MalformedResponse(_) => FailureKind::MalformedResponse,
            JobError::LocalIo { .. } => FailureKind::LocalIo,
            JobError::Upload { .. } => FailureKind::Upload,
            JobError::Panicked(_) => FailureKind::Panicked,
        }
    }
}

impl From<reqwest::Error> for JobError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return JobError::from_status(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return JobError::MalformedResponse(err.to_string());
        }
        JobError::Transport(err.to_string())
    }
}

/// Serializable classification of a task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RemoteJobFailed,
    ProviderThrottled,
    ProviderTransient,
    ProviderRejected,
    Transport,
    MalformedResponse,
    LocalIo,
    Upload,
    Panicked,
}

impl FailureKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RemoteJobFailed => "remote_job_failed",
            FailureKind::ProviderThrottled => "provider_throttled",
            FailureKind::ProviderTransient => "provider_transient",
            FailureKind::ProviderRejected => "provider_rejected",
            FailureKind::Transport => "transport",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::LocalIo => "local_io",
            FailureKind::Upload => "upload",
            FailureKind::Panicked => "panicked",
        }
    }
}

/// Errors that can occur while acquiring an access token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing credential: {0} environment variable not set")]
    MissingCredential(&'static str),

    #[error("Token request failed: {0}")]
    RequestFailed(String),

    #[error("Token endpoint returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Token response did not contain an access token")]
    MissingToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            JobError::from_status(429, "slow down"),
            JobError::ProviderThrottled { .. }
        ));
        assert!(matches!(
            JobError::from_status(503, "unavailable"),
            JobError::ProviderTransient { status: 503, .. }
        ));
        assert!(matches!(
            JobError::from_status(400, "bad prompt"),
            JobError::ProviderRejected { status: 400, .. }
        ));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(JobError::from_status(429, "").is_retryable());
        assert!(JobError::from_status(502, "").is_retryable());
        assert!(JobError::Transport("connection reset".to_string()).is_retryable());
        assert!(!JobError::from_status(403, "").is_retryable());
        assert!(!JobError::RemoteJobFailed {
            detail: "content policy".to_string()
        }
        .is_retryable());
        assert!(!JobError::MalformedResponse("no jobId".to_string()).is_retryable());
    }

    #[test]
    fn test_failure_kind_serialization() {
        let kind = JobError::RemoteJobFailed {
            detail: "x".to_string(),
        }
        .failure_kind();
        assert_eq!(kind, FailureKind::RemoteJobFailed);
        let json = serde_json::to_string(&kind).expect("serialization should succeed");
        assert_eq!(json, "\"remote_job_failed\"");
        assert_eq!(kind.as_str(), "remote_job_failed");
    }

    #[test]
    fn test_variation_error_display() {
        let err = VariationError::InvalidVariationCount {
            parameter: "iterations".to_string(),
            count: 7,
            min: 1,
            max: 4,
        };
        assert!(err.to_string().contains("between 1 and 4"));

        let err = VariationError::EmptyVariationAxis {
            parameter: "prompt".to_string(),
            position: 2,
        };
        assert!(err.to_string().contains("Empty variation list"));
    }

    #[test]
    fn test_local_io_display_includes_path() {
        let err = JobError::local_io(
            "out/a.png",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("out/a.png"));
        assert_eq!(err.failure_kind(), FailureKind::LocalIo);
    }
}
