//! Token values available to output filename templates.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::operations::size::Dimensions;
use crate::variation::TaskSpec;

/// Maximum number of prompt characters kept by the `{prompt}` token.
pub const PROMPT_TOKEN_MAX_CHARS: usize = 30;

/// Batch-wide values that are not part of a [`TaskSpec`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    /// Timestamp behind `{date}`, `{time}` and `{datetime}`. Captured once per
    /// batch so all tasks of a batch share it.
    pub timestamp: DateTime<Utc>,
    /// Seeds sent with every request.
    pub seeds: Vec<u64>,
    /// Requested output size.
    pub size: Option<Dimensions>,
}

impl RenderContext {
    /// A context stamped with the current time and no seeds or size.
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            seeds: Vec::new(),
            size: None,
        }
    }

    pub fn with_seeds(mut self, seeds: Vec<u64>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_size(mut self, size: Option<Dimensions>) -> Self {
        self.size = size;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Mapping from token name (without braces) to its rendered value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenameTokens {
    values: BTreeMap<String, String>,
}

impl FilenameTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the full token vocabulary for `task`.
    ///
    /// Tokens whose source value is absent (no seeds, no size, no reference)
    /// render as the empty string.
    pub fn from_task(task: &TaskSpec, context: &RenderContext) -> Self {
        let mut tokens = Self::new();

        tokens.insert("prompt", prompt_fragment(&task.prompt));
        tokens.insert("model", task.model.clone());
        tokens.insert("date", context.timestamp.format("%Y%m%d").to_string());
        tokens.insert("time", context.timestamp.format("%H%M%S").to_string());
        tokens.insert(
            "datetime",
            context.timestamp.format("%Y%m%d_%H%M%S").to_string(),
        );
        tokens.insert(
            "seed",
            context
                .seeds
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join("_"),
        );
        tokens.insert("sr", reference_stem(task.style_reference.as_deref()));
        tokens.insert("cr", reference_stem(task.composition_reference.as_deref()));

        match context.size {
            Some(size) => {
                tokens.insert("width", size.width.to_string());
                tokens.insert("height", size.height.to_string());
                tokens.insert("dimensions", size.to_string());
            }
            None => {
                tokens.insert("width", String::new());
                tokens.insert("height", String::new());
                tokens.insert("dimensions", String::new());
            }
        }

        tokens.insert("n", task.iteration.to_string());
        tokens.insert("iteration", task.iteration.to_string());
        tokens.insert("seq", task.sequence.to_string());

        for (index, choice) in task.prompt_choices.iter().enumerate() {
            tokens.insert(format!("var{}", index + 1), sanitize(choice));
        }

        tokens
    }

    /// Sets `name` to `value`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// The rendered value of `name`, if it is part of the vocabulary.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn prompt_fragment(prompt: &str) -> String {
    sanitize(prompt)
        .chars()
        .take(PROMPT_TOKEN_MAX_CHARS)
        .collect()
}

/// Spaces and path separators become underscores.
fn sanitize(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

fn reference_stem(reference: Option<&str>) -> String {
    reference
        .and_then(|value| {
            // Strip any query string from uploaded URLs before taking the stem.
            let value = value.split('?').next().unwrap_or(value);
            Path::new(value).file_stem()
        })
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task() -> TaskSpec {
        TaskSpec {
            sequence: 7,
            model: "image4_standard".to_string(),
            style_reference: Some("refs/watercolor.png".to_string()),
            composition_reference: None,
            prompt: "a very long prompt about a cat sitting on a window sill".to_string(),
            prompt_choices: vec!["cat".to_string(), "window sill".to_string()],
            iteration: 2,
        }
    }

    fn context() -> RenderContext {
        RenderContext::now()
            .with_timestamp(Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap())
            .with_seeds(vec![11, 42])
            .with_size(Some(Dimensions::new(2048, 1024)))
    }

    #[test]
    fn test_vocabulary_from_task() {
        let tokens = FilenameTokens::from_task(&task(), &context());

        assert_eq!(tokens.get("model"), Some("image4_standard"));
        assert_eq!(tokens.get("date"), Some("20240309"));
        assert_eq!(tokens.get("time"), Some("140507"));
        assert_eq!(tokens.get("datetime"), Some("20240309_140507"));
        assert_eq!(tokens.get("seed"), Some("11_42"));
        assert_eq!(tokens.get("sr"), Some("watercolor"));
        assert_eq!(tokens.get("cr"), Some(""));
        assert_eq!(tokens.get("width"), Some("2048"));
        assert_eq!(tokens.get("height"), Some("1024"));
        assert_eq!(tokens.get("dimensions"), Some("2048x1024"));
        assert_eq!(tokens.get("n"), Some("2"));
        assert_eq!(tokens.get("iteration"), Some("2"));
        assert_eq!(tokens.get("seq"), Some("7"));
        assert_eq!(tokens.get("var1"), Some("cat"));
        assert_eq!(tokens.get("var2"), Some("window_sill"));
        assert_eq!(tokens.get("var3"), None);
    }

    #[test]
    fn test_prompt_token_truncated_and_sanitized() {
        let tokens = FilenameTokens::from_task(&task(), &context());
        let prompt = tokens.get("prompt").expect("prompt token");
        assert_eq!(prompt.chars().count(), PROMPT_TOKEN_MAX_CHARS);
        assert!(prompt.starts_with("a_very_long_prompt"));
        assert!(!prompt.contains(' '));
    }

    #[test]
    fn test_prompt_with_path_separator() {
        let mut spec = task();
        spec.prompt = "red/blue".to_string();
        let tokens = FilenameTokens::from_task(&spec, &context());
        assert_eq!(tokens.get("prompt"), Some("red_blue"));
    }

    #[test]
    fn test_absent_values_render_empty() {
        let mut spec = task();
        spec.style_reference = None;
        let tokens = FilenameTokens::from_task(&spec, &RenderContext::now());
        assert_eq!(tokens.get("seed"), Some(""));
        assert_eq!(tokens.get("sr"), Some(""));
        assert_eq!(tokens.get("dimensions"), Some(""));
    }

    #[test]
    fn test_reference_stem_from_url() {
        assert_eq!(
            reference_stem(Some("https://acct.blob.core.windows.net/c/style.jpg?sig=abc")),
            "style"
        );
        assert_eq!(reference_stem(None), "");
    }
}
