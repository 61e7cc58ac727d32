//! Text-to-image generation.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Map, Value};

use super::size::Dimensions;
use super::{first_output_url, Operation, ResolvedReferences};
use crate::client::SubmitRequest;
use crate::error::{JobError, VariationError};
use crate::variation::TaskSpec;

/// Asynchronous image generation endpoint.
pub const IMAGE_GENERATE_URL: &str = "https://firefly-api.adobe.io/v3/images/generate-async";

/// Default model when none is given.
pub const DEFAULT_IMAGE_MODEL: &str = "image3";

/// Default reference strength.
pub const DEFAULT_REFERENCE_STRENGTH: u8 = 50;

/// Most seeds one request accepts.
pub const MAX_SEEDS: usize = 4;

/// Maps model aliases to the identifiers the service expects.
///
/// Unknown names pass through unchanged.
pub fn normalize_model_name(model: &str) -> String {
    match model.trim() {
        "image4" => "image4_standard".to_string(),
        "ultra" => "image4_ultra".to_string(),
        other => other.to_string(),
    }
}

/// Human-readable model name for progress output.
pub fn display_name(model: &str) -> String {
    match model {
        "image3" => "Image 3".to_string(),
        "image3_custom" => "Image 3 Custom".to_string(),
        "image4_standard" => "Image 4".to_string(),
        "image4_ultra" => "Image 4 Ultra".to_string(),
        other => other.to_string(),
    }
}

/// Content class hint sent with every image request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentClass {
    #[default]
    Photo,
    Art,
}

impl ContentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentClass::Photo => "photo",
            ContentClass::Art => "art",
        }
    }
}

impl fmt::Display for ContentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentClass {
    type Err = VariationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "photo" => Ok(ContentClass::Photo),
            "art" => Ok(ContentClass::Art),
            other => Err(VariationError::InvalidParameter {
                parameter: "content_class".to_string(),
                message: format!("'{}' is not one of: photo, art", other),
            }),
        }
    }
}

/// Batch-wide image generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    pub content_class: ContentClass,
    pub negative_prompt: Option<String>,
    pub locale: Option<String>,
    pub size: Option<Dimensions>,
    pub seeds: Vec<u64>,
    /// Visual intensity on a 1..=10 scale.
    pub visual_intensity: Option<u8>,
    /// Style reference strength, 1..=100.
    pub style_strength: u8,
    /// Composition reference strength, 1..=100.
    pub composition_strength: u8,
    pub endpoint: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            content_class: ContentClass::default(),
            negative_prompt: None,
            locale: None,
            size: None,
            seeds: Vec::new(),
            visual_intensity: None,
            style_strength: DEFAULT_REFERENCE_STRENGTH,
            composition_strength: DEFAULT_REFERENCE_STRENGTH,
            endpoint: IMAGE_GENERATE_URL.to_string(),
        }
    }
}

impl ImageOptions {
    /// Checks numeric ranges before any task is dispatched.
    pub fn validate(&self) -> Result<(), VariationError> {
        if let Some(intensity) = self.visual_intensity {
            check_range("visual_intensity", intensity, 1, 10)?;
        }
        check_range("style_reference_strength", self.style_strength, 1, 100)?;
        check_range("composition_reference_strength", self.composition_strength, 1, 100)?;
        if self.seeds.len() > MAX_SEEDS {
            return Err(VariationError::InvalidParameter {
                parameter: "seeds".to_string(),
                message: format!("{} seeds given, at most {} allowed", self.seeds.len(), MAX_SEEDS),
            });
        }
        Ok(())
    }
}

fn check_range(parameter: &str, value: u8, min: u8, max: u8) -> Result<(), VariationError> {
    if (min..=max).contains(&value) {
        return Ok(());
    }
    Err(VariationError::InvalidParameter {
        parameter: parameter.to_string(),
        message: format!("{} is outside {}..={}", value, min, max),
    })
}

/// Image generation as an [`Operation`].
#[derive(Debug, Clone)]
pub struct ImageOperation {
    options: ImageOptions,
}

impl ImageOperation {
    pub fn new(options: ImageOptions) -> Result<Self, VariationError> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &ImageOptions {
        &self.options
    }
}

fn image_reference(url: &str, strength: u8) -> Value {
    json!({
        "imageReference": { "source": { "url": url } },
        "strength": strength,
    })
}

impl Operation for ImageOperation {
    fn name(&self) -> &'static str {
        "image"
    }

    fn build_request(&self, task: &TaskSpec, references: &ResolvedReferences) -> SubmitRequest {
        let options = &self.options;
        let mut body = Map::new();
        body.insert("prompt".into(), json!(task.prompt));
        body.insert("numVariations".into(), json!(1));
        body.insert("modelVersion".into(), json!(task.model));
        body.insert("contentClass".into(), json!(options.content_class.as_str()));

        if let Some(negative) = &options.negative_prompt {
            body.insert("negativePrompt".into(), json!(negative));
        }
        if let Some(locale) = &options.locale {
            body.insert("promptBiasingLocale".into(), json!(locale));
        }
        if let Some(size) = options.size {
            body.insert("size".into(), json!(size));
        }
        if !options.seeds.is_empty() {
            body.insert("seeds".into(), json!(options.seeds));
        }
        if let Some(intensity) = options.visual_intensity {
            body.insert("intensity".into(), json!(f64::from(intensity) / 10.0));
        }
        if let Some(style) = &references.style {
            body.insert("style".into(), image_reference(style, options.style_strength));
        }
        if let Some(composition) = &references.composition {
            body.insert(
                "structure".into(),
                image_reference(composition, options.composition_strength),
            );
        }

        SubmitRequest::new(&options.endpoint, Value::Object(body))
            .with_header("x-model-version", &task.model)
    }

    fn artifact_url(&self, payload: &Value) -> Result<String, JobError> {
        first_output_url(payload, "image")
    }
}
