//! Image generation from a source image.
//!
//! One source image is shared by the whole batch; the model axis and the
//! iterations set the task count.

use serde_json::{json, Map, Value};

use super::image::MAX_SEEDS;
use super::size::Dimensions;
use super::{first_output_url, Operation, ResolvedReferences};
use crate::client::SubmitRequest;
use crate::error::{JobError, VariationError};
use crate::variation::TaskSpec;

/// Similar-image generation endpoint.
pub const SIMILAR_IMAGE_URL: &str = "https://firefly-api.adobe.io/v3/images/generate-similar-async";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarImageOptions {
    /// Local path or URL of the source image.
    pub source: String,
    pub size: Option<Dimensions>,
    pub seeds: Vec<u64>,
    pub endpoint: String,
}

impl SimilarImageOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            size: None,
            seeds: Vec::new(),
            endpoint: SIMILAR_IMAGE_URL.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), VariationError> {
        if self.source.trim().is_empty() {
            return Err(VariationError::InvalidParameter {
                parameter: "input".to_string(),
                message: "a source image is required".to_string(),
            });
        }
        if self.seeds.len() > MAX_SEEDS {
            return Err(VariationError::InvalidParameter {
                parameter: "seeds".to_string(),
                message: format!("{} seeds given, at most {} allowed", self.seeds.len(), MAX_SEEDS),
            });
        }
        Ok(())
    }
}

/// Similar-image generation as an [`Operation`].
#[derive(Debug, Clone)]
pub struct SimilarImageOperation {
    options: SimilarImageOptions,
}

impl SimilarImageOperation {
    pub fn new(options: SimilarImageOptions) -> Result<Self, VariationError> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &SimilarImageOptions {
        &self.options
    }
}

impl Operation for SimilarImageOperation {
    fn name(&self) -> &'static str {
        "similar_image"
    }

    fn source_input(&self) -> Option<&str> {
        Some(&self.options.source)
    }

    fn build_request(&self, task: &TaskSpec, references: &ResolvedReferences) -> SubmitRequest {
        let source = references.source.as_deref().unwrap_or(&self.options.source);
        let mut body = Map::new();
        body.insert("numVariations".into(), json!(1));
        body.insert("image".into(), json!({"source": {"url": source}}));
        if let Some(size) = self.options.size {
            body.insert("size".into(), json!(size));
        }
        if !self.options.seeds.is_empty() {
            body.insert("seeds".into(), json!(self.options.seeds));
        }

        SubmitRequest::new(&self.options.endpoint, Value::Object(body))
            .with_header("x-model-version", &task.model)
    }

    fn artifact_url(&self, payload: &Value) -> Result<String, JobError> {
        first_output_url(payload, "image")
    }
}
