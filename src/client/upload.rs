//! Reference-file uploaders.
//!
//! - [`LocalFileUploader`] hands the service a `file://` URL to the absolute path.
//! - [`AzureSasUploader`] PUTs the file as a block blob into a container
//!   addressed by a SAS URL and returns the blob URL with the same token.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use super::api::Uploader;
use crate::error::JobError;

/// Upload timeout in seconds.
const UPLOAD_TIMEOUT_SECS: u64 = 300;

/// Sends local paths as `file://` URLs without transferring the file.
#[derive(Debug, Default, Clone)]
pub struct LocalFileUploader;

#[async_trait]
impl Uploader for LocalFileUploader {
    async fn upload(&self, path: &Path) -> Result<String, JobError> {
        let absolute = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| JobError::local_io(path, e))?;
        Ok(format!("file://{}", absolute.display()))
    }
}

/// Uploads into an Azure Blob Storage container through a SAS URL.
pub struct AzureSasUploader {
    http: Client,
    /// `https://<account>.blob.core.windows.net/<container>`
    container_url: String,
    /// SAS query string without the leading `?`.
    sas_token: String,
}

impl AzureSasUploader {
    /// Creates an uploader from a container SAS URL
    /// (`https://acct.blob.core.windows.net/container?sv=...&sig=...`).
    pub fn new(container_sas_url: &str) -> Result<Self, JobError> {
        let (container_url, sas_token) = container_sas_url
            .split_once('?')
            .filter(|(_, query)| !query.is_empty())
            .ok_or_else(|| JobError::Upload {
                path: Default::default(),
                reason: "container SAS URL has no query token".to_string(),
            })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| JobError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            container_url: container_url.trim_end_matches('/').to_string(),
            sas_token: sas_token.to_string(),
        })
    }

    fn blob_url(&self, blob_name: &str) -> String {
        format!(
            "{}/{}?{}",
            self.container_url,
            urlencoding::encode(blob_name),
            self.sas_token
        )
    }
}

#[async_trait]
impl Uploader for AzureSasUploader {
    async fn upload(&self, path: &Path) -> Result<String, JobError> {
        let blob_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| JobError::Upload {
                path: path.to_path_buf(),
                reason: "path has no file name".to_string(),
            })?;
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| JobError::local_io(path, e))?;
        let size = data.len();
        let url = self.blob_url(&blob_name);

        let response = self
            .http
            .put(&url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", content_type(path))
            .body(data)
            .send()
            .await
            .map_err(|e| JobError::Upload {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JobError::Upload {
                path: path.to_path_buf(),
                reason: format!("{}: {}", status, body),
            });
        }

        info!(path = %path.display(), blob = %blob_name, bytes = size, "Uploaded reference file");
        Ok(url)
    }
}

/// Content type guessed from the file extension.
fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
