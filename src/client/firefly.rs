//! reqwest-backed [`JobApi`] for the Firefly asynchronous endpoints.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::api::JobApi;
use super::types::{JobHandle, JobStatus, SubmitRequest};
use crate::error::JobError;

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Longest error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Authenticated client for submission, status and download calls.
pub struct FireflyClient {
    http: Client,
    client_id: String,
    access_token: String,
}

impl FireflyClient {
    /// Creates a client with the default request timeout.
    pub fn new(client_id: impl Into<String>, access_token: impl Into<String>) -> Result<Self, JobError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| JobError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_http_client(http, client_id, access_token))
    }

    /// Creates a client around an existing reqwest [`Client`].
    pub fn with_http_client(
        http: Client,
        client_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            client_id: client_id.into(),
            access_token: access_token.into(),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("x-api-key", &self.client_id)
    }

    /// Maps a non-success response to the matching [`JobError`].
    async fn check_status(response: Response) -> Result<Response, JobError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        Err(JobError::from_status(status.as_u16(), message))
    }
}

#[async_trait]
impl JobApi for FireflyClient {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobHandle, JobError> {
        let mut builder = self
            .authorized(self.http.post(&request.url))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.json(&request.body).send().await?;
        let response = Self::check_status(response).await?;
        let handle: JobHandle = response
            .json()
            .await
            .map_err(|e| JobError::MalformedResponse(format!("submission response: {}", e)))?;

        debug!(job_id = %handle.job_id, "Job submitted");
        Ok(handle)
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, JobError> {
        let response = self
            .authorized(self.http.get(&handle.status_url))
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| JobError::MalformedResponse(format!("status response: {}", e)))?;
        JobStatus::from_payload(payload)
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<u64, JobError> {
        // Artifact URLs are pre-signed; no auth headers.
        let response = self.http.get(url).send().await?;
        let mut response = Self::check_status(response).await?;

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| JobError::local_io(destination, e))?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| JobError::local_io(destination, e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| JobError::local_io(destination, e))?;

        debug!(path = %destination.display(), bytes = written, "Artifact downloaded");
        Ok(written)
    }
}
