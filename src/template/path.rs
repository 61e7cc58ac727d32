//! Output path rendering and collision resolution.
//!
//! Rendering is pure string substitution. Uniqueness is resolved separately,
//! against the filesystem as it is at write time, so sibling tasks that
//! render to the same base name end up with distinct files.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use super::tokens::{FilenameTokens, RenderContext};
use crate::error::JobError;
use crate::variation::TaskSpec;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z][A-Za-z0-9_]*)\}").expect("Invalid regex for filename tokens")
});

/// Substitutes every known `{token}` in `template`.
///
/// Tokens missing from `tokens` are left verbatim.
pub fn render(template: &str, tokens: &FilenameTokens) -> String {
    TOKEN_PATTERN
        .replace_all(template, |caps: &Captures<'_>| match tokens.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Chooses the final output path for `path`, creating parent directories.
///
/// With `overwrite`, `path` is returned unchanged. Otherwise the first free
/// name among `path`, `name_1.ext`, `name_2.ext`, … is claimed by creating an
/// empty file there, so concurrent callers never receive the same path.
///
/// # Errors
///
/// Returns [`JobError::LocalIo`] if a directory or the reservation cannot be
/// created.
pub fn resolve_unique(path: &Path, overwrite: bool) -> Result<PathBuf, JobError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| JobError::local_io(parent, e))?;
    }

    if overwrite {
        return Ok(path.to_path_buf());
    }

    let mut candidate = path.to_path_buf();
    let mut counter = 0u32;
    loop {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => {
                if counter > 0 {
                    debug!(
                        requested = %path.display(),
                        resolved = %candidate.display(),
                        "Output path taken, using numbered suffix"
                    );
                }
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                counter += 1;
                candidate = numbered(path, counter);
            }
            Err(e) => return Err(JobError::local_io(candidate, e)),
        }
    }
}

/// `dir/name.ext` becomes `dir/name_{n}.ext`.
fn numbered(path: &Path, n: u32) -> PathBuf {
    with_stem_suffix(path.to_path_buf(), &n.to_string())
}

/// Chosen prompt options joined by underscores. Only alphanumerics and
/// hyphens survive; spaces become underscores.
fn variation_suffix(choices: &[String]) -> String {
    choices
        .iter()
        .map(|choice| {
            choice
                .trim()
                .chars()
                .filter_map(|c| match c {
                    ' ' => Some('_'),
                    c if c.is_alphanumeric() || c == '-' => Some(c),
                    _ => None,
                })
                .collect::<String>()
        })
        .filter(|choice| !choice.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Appends `_{suffix}` to the file stem of `path`, keeping the extension.
fn with_stem_suffix(path: PathBuf, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    };
    path.with_file_name(file_name)
}

/// An output filename template bound to one batch.
///
/// With the variation suffix enabled, values the template does not mention
/// are appended to the file stem: the model when `{model}` is absent, then
/// the chosen prompt options when no `{varN}` token is used.
#[derive(Debug, Clone)]
pub struct OutputTemplate {
    template: String,
    overwrite: bool,
    variation_suffix: bool,
    context: RenderContext,
}

impl OutputTemplate {
    pub fn new(template: impl Into<String>, overwrite: bool, context: RenderContext) -> Self {
        Self {
            template: template.into(),
            overwrite,
            variation_suffix: false,
            context,
        }
    }

    pub fn with_variation_suffix(mut self, enabled: bool) -> Self {
        self.variation_suffix = enabled;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Renders the template for `task` without touching the filesystem.
    pub fn render(&self, task: &TaskSpec) -> PathBuf {
        let tokens = FilenameTokens::from_task(task, &self.context);
        let path = PathBuf::from(render(&self.template, &tokens));
        if !self.variation_suffix {
            return path;
        }

        let mut parts = Vec::new();
        if !self.template.contains("{model}") {
            if let Some(model) = tokens.get("model").filter(|m| !m.is_empty()) {
                parts.push(model.to_string());
            }
        }
        if !self.template.contains("{var") {
            let choices = variation_suffix(&task.prompt_choices);
            if !choices.is_empty() {
                parts.push(choices);
            }
        }

        if parts.is_empty() {
            path
        } else {
            with_stem_suffix(path, &parts.join("_"))
        }
    }

    /// Renders and resolves the final output path for `task`.
    pub fn resolve(&self, task: &TaskSpec) -> Result<PathBuf, JobError> {
        resolve_unique(&self.render(task), self.overwrite)
    }

    /// Releases a path returned by [`OutputTemplate::resolve`] after a failed
    /// write. Overwrite mode never reserves, so nothing is removed then.
    pub fn discard(&self, path: &Path) {
        if self.overwrite {
            return;
        }
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != ErrorKind::NotFound {
                debug!(path = %path.display(), error = %e, "Failed to remove reserved output path");
            }
        }
    }
}
