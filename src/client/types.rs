//! Wire types shared by every remote job operation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JobError;

/// Handle returned by a successful asynchronous submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "statusUrl")]
    pub status_url: String,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>, status_url: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status_url: status_url.into(),
        }
    }
}

/// Interpretation of one status query.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Terminal success; carries the full status payload.
    Succeeded(Value),
    /// Terminal failure with the remote error detail.
    Failed(String),
    /// Any other status value.
    InProgress(String),
}

impl JobStatus {
    /// Classifies a status payload by its `status` field.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::MalformedResponse`] if the payload has no string
    /// `status` field.
    pub fn from_payload(payload: Value) -> Result<Self, JobError> {
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                JobError::MalformedResponse(format!("status payload has no 'status' field: {}", payload))
            })?
            .to_string();

        Ok(match status.as_str() {
            "succeeded" => JobStatus::Succeeded(payload),
            "failed" => JobStatus::Failed(error_detail(&payload)),
            _ => JobStatus::InProgress(status),
        })
    }
}

/// Extracts a readable error from a failed status payload.
fn error_detail(payload: &Value) -> String {
    match payload.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(error @ Value::Object(fields)) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        Some(Value::Null) | None => payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string(),
        Some(other) => other.to_string(),
    }
}

/// A fully built submission: endpoint, extra headers and JSON body.
///
/// Authentication headers are added by the client, not by the operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl SubmitRequest {
    pub fn new(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}
