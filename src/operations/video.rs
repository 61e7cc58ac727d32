//! Text-to-video generation.

use serde_json::{json, Value};

use super::size::Dimensions;
use super::{first_output_url, Operation, ResolvedReferences};
use crate::client::SubmitRequest;
use crate::error::JobError;
use crate::variation::TaskSpec;

/// Video generation endpoint.
pub const VIDEO_GENERATE_URL: &str = "https://firefly-beta.adobe.io/v3/videos/generate";

/// Model version used when none is given; each task sends its own model in
/// the `x-model-version` header.
pub const DEFAULT_VIDEO_MODEL: &str = "video1_8_standard";

/// Default video size name.
pub const DEFAULT_VIDEO_SIZE: &str = "1080p";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOptions {
    pub size: Dimensions,
    pub endpoint: String,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            size: Dimensions::new(1920, 1080),
            endpoint: VIDEO_GENERATE_URL.to_string(),
        }
    }
}

impl VideoOptions {
    pub fn with_size(mut self, size: Dimensions) -> Self {
        self.size = size;
        self
    }
}

/// Video generation as an [`Operation`]. The prompt and model version vary
/// per task; reference images are ignored.
#[derive(Debug, Clone, Default)]
pub struct VideoOperation {
    options: VideoOptions,
}

impl VideoOperation {
    pub fn new(options: VideoOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &VideoOptions {
        &self.options
    }
}

impl Operation for VideoOperation {
    fn name(&self) -> &'static str {
        "video"
    }

    fn build_request(&self, task: &TaskSpec, _references: &ResolvedReferences) -> SubmitRequest {
        let body = json!({
            "prompt": task.prompt,
            "sizes": [self.options.size],
        });
        SubmitRequest::new(&self.options.endpoint, body)
            .with_header("x-model-version", &task.model)
    }

    fn artifact_url(&self, payload: &Value) -> Result<String, JobError> {
        first_output_url(payload, "video")
    }
}
