//! Batch operations built on the scheduling core.
//!
//! An [`Operation`] only knows how to shape a submission for one task and
//! where the artifact URL sits in the finished job's payload. Everything
//! else (rate limiting, local retry, polling, output naming, download) is
//! shared by [`RemoteJobUnit`].

pub mod image;
pub mod runner;
pub mod similar;
pub mod size;
pub mod speech;
pub mod video;

use serde_json::Value;

use crate::client::SubmitRequest;
use crate::error::JobError;
use crate::variation::TaskSpec;

pub use image::{display_name, normalize_model_name, ContentClass, ImageOperation, ImageOptions};
pub use runner::RemoteJobUnit;
pub use similar::{SimilarImageOperation, SimilarImageOptions};
pub use size::{parse_image_size, parse_video_size, Dimensions};
pub use speech::{SpeechOperation, SpeechOptions};
pub use video::{VideoOperation, VideoOptions};

/// Reference inputs of a task after upload, as URLs the service can fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedReferences {
    pub style: Option<String>,
    pub composition: Option<String>,
    /// The operation's batch-wide input file.
    pub source: Option<String>,
}

/// One kind of remote asynchronous job.
pub trait Operation: Send + Sync + 'static {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Input file shared by every task of the batch, uploaded like a
    /// reference image.
    fn source_input(&self) -> Option<&str> {
        None
    }

    /// Builds the submission for `task`.
    fn build_request(&self, task: &TaskSpec, references: &ResolvedReferences) -> SubmitRequest;

    /// Extracts the artifact URL from a `succeeded` status payload.
    fn artifact_url(&self, payload: &Value) -> Result<String, JobError>;
}

/// Looks up `outputs[0].<kind>.url`, under `result` or at the top level.
pub(crate) fn first_output_url(payload: &Value, kind: &str) -> Result<String, JobError> {
    let outputs = payload
        .get("result")
        .and_then(|result| result.get("outputs"))
        .or_else(|| payload.get("outputs"));

    outputs
        .and_then(|outputs| outputs.get(0))
        .and_then(|output| output.get(kind))
        .and_then(|artifact| artifact.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            JobError::MalformedResponse(format!("no {} output URL in job result", kind))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_output_url_locations() {
        let nested = json!({"status": "succeeded", "result": {"outputs": [{"image": {"url": "https://a/1.png"}}]}});
        assert_eq!(first_output_url(&nested, "image").expect("nested"), "https://a/1.png");

        let flat = json!({"status": "succeeded", "outputs": [{"video": {"url": "https://a/1.mp4"}}]});
        assert_eq!(first_output_url(&flat, "video").expect("flat"), "https://a/1.mp4");
    }

    #[test]
    fn test_first_output_url_missing() {
        for payload in [
            json!({"status": "succeeded"}),
            json!({"status": "succeeded", "result": {"outputs": []}}),
            json!({"status": "succeeded", "outputs": [{"image": {}}]}),
        ] {
            assert!(matches!(
                first_output_url(&payload, "image"),
                Err(JobError::MalformedResponse(_))
            ));
        }
    }
}
