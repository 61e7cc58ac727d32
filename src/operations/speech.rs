//! Text-to-speech generation.
//!
//! The script text rides the prompt axis and the voice id rides the model
//! axis, so `-t "..." --voice-id "[v1,v2]"` runs one job per voice.

use serde_json::{json, Value};

use super::{Operation, ResolvedReferences};
use crate::client::SubmitRequest;
use crate::error::{JobError, VariationError};
use crate::variation::TaskSpec;

/// Speech generation endpoint.
pub const SPEECH_GENERATE_URL: &str = "https://audio-video-api.adobe.io/v1/generate-speech";

pub const DEFAULT_SPEECH_LOCALE: &str = "en-US";

/// Shortest script the service accepts.
pub const MIN_SCRIPT_CHARS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechOptions {
    pub locale: String,
    pub endpoint: String,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            locale: DEFAULT_SPEECH_LOCALE.to_string(),
            endpoint: SPEECH_GENERATE_URL.to_string(),
        }
    }
}

impl SpeechOptions {
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }
}

/// Rejects scripts shorter than [`MIN_SCRIPT_CHARS`].
pub fn validate_script(text: &str) -> Result<(), VariationError> {
    let chars = text.trim().chars().count();
    if chars >= MIN_SCRIPT_CHARS {
        return Ok(());
    }
    Err(VariationError::InvalidParameter {
        parameter: "text".to_string(),
        message: format!(
            "script has {} characters, at least {} required",
            chars, MIN_SCRIPT_CHARS
        ),
    })
}

/// Text-to-speech as an [`Operation`].
#[derive(Debug, Clone, Default)]
pub struct SpeechOperation {
    options: SpeechOptions,
}

impl SpeechOperation {
    pub fn new(options: SpeechOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SpeechOptions {
        &self.options
    }

    /// Validates the script of every task before dispatch.
    pub fn check_tasks(&self, tasks: &[TaskSpec]) -> Result<(), VariationError> {
        tasks.iter().try_for_each(|task| validate_script(&task.prompt))
    }
}

impl Operation for SpeechOperation {
    fn name(&self) -> &'static str {
        "speech"
    }

    fn build_request(&self, task: &TaskSpec, _references: &ResolvedReferences) -> SubmitRequest {
        let body = json!({
            "script": {
                "text": task.prompt,
                "mediaType": "text/plain",
                "localeCode": self.options.locale,
            },
            "voiceId": task.model,
            "output": {"mediaType": "audio/wav"},
        });
        SubmitRequest::new(&self.options.endpoint, body)
    }

    fn artifact_url(&self, payload: &Value) -> Result<String, JobError> {
        payload
            .get("output")
            .and_then(|output| output.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| JobError::MalformedResponse("no audio output URL in job result".to_string()))
    }
}
