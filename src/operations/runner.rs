//! The shared work unit: upload, submit, poll, download.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{Operation, ResolvedReferences};
use crate::client::{is_remote_reference, JobApi, LocalFileUploader, Uploader};
use crate::error::JobError;
use crate::metrics::MetricsCollector;
use crate::ratelimit::RateLimiter;
use crate::scheduler::{JobStatusPoller, RetryPolicy, WorkUnit};
use crate::template::OutputTemplate;
use crate::variation::TaskSpec;

/// Runs one [`Operation`] for one task per [`WorkUnit::execute`] call.
///
/// Every submission waits on the shared [`RateLimiter`] and goes through the
/// local [`RetryPolicy`]. The output path is resolved only after the job
/// succeeded, so uniqueness reflects the filesystem at write time.
pub struct RemoteJobUnit<O: Operation> {
    operation: O,
    api: Arc<dyn JobApi>,
    uploader: Arc<dyn Uploader>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    poller: JobStatusPoller,
    output: OutputTemplate,
    metrics: MetricsCollector,
    source: OnceCell<Option<String>>,
}

impl<O: Operation> RemoteJobUnit<O> {
    /// Creates a unit with the default retry policy, a default poller and
    /// `file://` references.
    pub fn new(
        operation: O,
        api: Arc<dyn JobApi>,
        limiter: Arc<RateLimiter>,
        output: OutputTemplate,
    ) -> Self {
        Self {
            poller: JobStatusPoller::new(Arc::clone(&api)),
            operation,
            api,
            uploader: Arc::new(LocalFileUploader),
            limiter,
            retry: RetryPolicy::default(),
            output,
            metrics: MetricsCollector::new(),
            source: OnceCell::new(),
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = uploader;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poller(mut self, poller: JobStatusPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn operation(&self) -> &O {
        &self.operation
    }

    pub fn output(&self) -> &OutputTemplate {
        &self.output
    }

    async fn resolve_reference(&self, reference: Option<&str>) -> Result<Option<String>, JobError> {
        match reference {
            None => Ok(None),
            Some(value) if is_remote_reference(value) => Ok(Some(value.to_string())),
            Some(value) => self.uploader.upload(Path::new(value)).await.map(Some),
        }
    }

    /// Uploads local references; the same path is uploaded once per task.
    /// The operation's source input is uploaded once per unit.
    async fn resolve_references(&self, task: &TaskSpec) -> Result<ResolvedReferences, JobError> {
        let source = self
            .source
            .get_or_try_init(|| self.resolve_reference(self.operation.source_input()))
            .await?
            .clone();
        let style = self.resolve_reference(task.style_reference.as_deref()).await?;
        let composition = if task.composition_reference.is_some()
            && task.composition_reference == task.style_reference
        {
            style.clone()
        } else {
            self.resolve_reference(task.composition_reference.as_deref())
                .await?
        };
        Ok(ResolvedReferences {
            style,
            composition,
            source,
        })
    }

    async fn download(&self, task: &TaskSpec, url: &str) -> Result<PathBuf, JobError> {
        let path = self.output.resolve(task)?;
        let result = self
            .retry
            .run("download", || {
                let path = path.as_path();
                async move { self.api.download(url, path).await }
            })
            .await;

        match result {
            Ok(bytes) => {
                debug!(sequence = task.sequence, bytes, path = %path.display(), "Saved artifact");
                Ok(path)
            }
            Err(err) => {
                self.output.discard(&path);
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<O: Operation> WorkUnit for RemoteJobUnit<O> {
    fn name(&self) -> &str {
        self.operation.name()
    }

    async fn execute(&self, task: &TaskSpec) -> Result<PathBuf, JobError> {
        let references = self.resolve_references(task).await?;
        let request = self.operation.build_request(task, &references);
        let operation = self.operation.name();

        let handle = self
            .retry
            .run("submit", || {
                let request = &request;
                async move {
                    self.limiter.acquire().await;
                    let result = self.api.submit(request).await;
                    let outcome = match &result {
                        Ok(_) => "accepted",
                        Err(err) => err.failure_kind().as_str(),
                    };
                    self.metrics.record_submission(operation, outcome);
                    result
                }
            })
            .await?;

        info!(
            sequence = task.sequence,
            job_id = %handle.job_id,
            operation,
            "Job submitted"
        );

        let payload = self.poller.poll_until_done(&handle).await?;
        let url = self.operation.artifact_url(&payload)?;
        self.download(task, &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{JobHandle, JobStatus, SubmitRequest};
    use crate::operations::{ImageOperation, ImageOptions};
    use crate::ratelimit::RateLimitConfig;
    use crate::template::RenderContext;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// In-memory service: scripted submit failures, immediate success.
    #[derive(Default)]
    struct FakeApi {
        submit_failures: Mutex<Vec<u16>>,
        submitted: Mutex<Vec<SubmitRequest>>,
        fail_download: bool,
        remote_failure: Option<String>,
    }

    #[async_trait]
    impl JobApi for FakeApi {
        async fn submit(&self, request: &SubmitRequest) -> Result<JobHandle, JobError> {
            self.submitted.lock().unwrap().push(request.clone());
            let mut failures = self.submit_failures.lock().unwrap();
            if !failures.is_empty() {
                let status = failures.remove(0);
                return Err(JobError::from_status(status, "scripted"));
            }
            Ok(JobHandle::new("job", "https://service.test/status/job"))
        }

        async fn status(&self, _handle: &JobHandle) -> Result<JobStatus, JobError> {
            if let Some(detail) = &self.remote_failure {
                return Ok(JobStatus::Failed(detail.clone()));
            }
            Ok(JobStatus::Succeeded(json!({
                "status": "succeeded",
                "result": {"outputs": [{"image": {"url": "https://cdn.test/out.png"}}]}
            })))
        }

        async fn download(&self, _url: &str, destination: &Path) -> Result<u64, JobError> {
            if self.fail_download {
                return Err(JobError::from_status(403, "expired"));
            }
            std::fs::write(destination, b"png").map_err(|e| JobError::local_io(destination, e))?;
            Ok(3)
        }
    }

    #[derive(Default)]
    struct CountingUploader {
        uploads: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl Uploader for CountingUploader {
        async fn upload(&self, path: &Path) -> Result<String, JobError> {
            self.uploads.lock().unwrap().push(path.to_path_buf());
            Ok(format!("https://blob.test/{}", path.display()))
        }
    }

    fn task(style: Option<&str>, composition: Option<&str>) -> TaskSpec {
        TaskSpec {
            sequence: 0,
            model: "image3".to_string(),
            style_reference: style.map(str::to_string),
            composition_reference: composition.map(str::to_string),
            prompt: "a cat".to_string(),
            prompt_choices: vec!["cat".to_string()],
            iteration: 1,
        }
    }

    fn unit(api: Arc<FakeApi>, dir: &TempDir) -> RemoteJobUnit<ImageOperation> {
        let template = format!("{}/{{model}}_{{n}}.png", dir.path().display());
        RemoteJobUnit::new(
            ImageOperation::new(ImageOptions::default()).expect("options"),
            api,
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
            OutputTemplate::new(template, false, RenderContext::now()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_writes_artifact() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi::default());
        let path = unit(api.clone(), &dir).execute(&task(None, None)).await.expect("execute");

        assert_eq!(path, dir.path().join("image3_1.png"));
        assert_eq!(std::fs::read(&path).expect("read"), b"png");
        assert_eq!(api.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_submission_retried_locally() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi {
            submit_failures: Mutex::new(vec![429, 429]),
            ..Default::default()
        });
        let start = tokio::time::Instant::now();

        unit(api.clone(), &dir)
            .execute(&task(None, None))
            .await
            .expect("should succeed after cool-down");

        assert_eq!(api.submitted.lock().unwrap().len(), 3);
        assert!(start.elapsed() >= Duration::from_secs(140));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_surfaces() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi {
            remote_failure: Some("moderation".to_string()),
            ..Default::default()
        });
        let err = unit(api, &dir).execute(&task(None, None)).await.unwrap_err();
        assert!(matches!(err, JobError::RemoteJobFailed { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).expect("dir").count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_download_releases_path() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi {
            fail_download: true,
            ..Default::default()
        });
        let err = unit(api, &dir).execute(&task(None, None)).await.unwrap_err();

        assert!(matches!(err, JobError::ProviderRejected { status: 403, .. }));
        assert!(!dir.path().join("image3_1.png").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_references_uploaded_once_and_remote_passed_through() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi::default());
        let uploader = Arc::new(CountingUploader::default());
        let unit = unit(api.clone(), &dir).with_uploader(uploader.clone());

        unit.execute(&task(Some("refs/a.png"), Some("refs/a.png")))
            .await
            .expect("execute");
        assert_eq!(uploader.uploads.lock().unwrap().len(), 1);

        unit.execute(&task(Some("https://cdn.test/s.png"), None))
            .await
            .expect("execute");
        assert_eq!(uploader.uploads.lock().unwrap().len(), 1);

        let submitted = api.submitted.lock().unwrap();
        assert_eq!(
            submitted[0].body["structure"]["imageReference"]["source"]["url"],
            "https://blob.test/refs/a.png"
        );
        assert_eq!(
            submitted[1].body["style"]["imageReference"]["source"]["url"],
            "https://cdn.test/s.png"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_input_uploaded_once_per_batch() {
        use crate::operations::{SimilarImageOperation, SimilarImageOptions};

        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi::default());
        let uploader = Arc::new(CountingUploader::default());
        let template = format!("{}/{{model}}_{{n}}.png", dir.path().display());
        let unit = RemoteJobUnit::new(
            SimilarImageOperation::new(SimilarImageOptions::new("inputs/photo.jpg")).expect("options"),
            api.clone(),
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
            OutputTemplate::new(template, false, RenderContext::now()),
        )
        .with_uploader(uploader.clone());

        unit.execute(&task(None, None)).await.expect("first");
        unit.execute(&task(None, None)).await.expect("second");

        assert_eq!(
            *uploader.uploads.lock().unwrap(),
            vec![PathBuf::from("inputs/photo.jpg")]
        );
        let submitted = api.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 2);
        for request in submitted.iter() {
            assert_eq!(
                request.body["image"]["source"]["url"],
                "https://blob.test/inputs/photo.jpg"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sibling_tasks_get_distinct_paths() {
        let dir = TempDir::new().expect("tempdir");
        let unit = unit(Arc::new(FakeApi::default()), &dir);

        let first = unit.execute(&task(None, None)).await.expect("first");
        let second = unit.execute(&task(None, None)).await.expect("second");
        assert_ne!(first, second);
        assert_eq!(second, dir.path().join("image3_1_1.png"));
    }
}
