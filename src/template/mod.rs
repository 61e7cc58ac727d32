//! Output filename templating.
//!
//! A template such as `out/{model}_{var1}_{n}.png` is rendered from a task's
//! [`FilenameTokens`], then resolved against the filesystem so that no two
//! tasks write to the same file unless overwriting was requested.
//!
//! # Example
//!
//! ```ignore
//! use batchforge::template::{OutputTemplate, RenderContext};
//!
//! let output = OutputTemplate::new("out/{model}_{n}.png", false, RenderContext::now());
//! let path = output.resolve(&task)?;
//! ```

pub mod path;
pub mod tokens;

pub use path::{render, resolve_unique, OutputTemplate};
pub use tokens::{FilenameTokens, RenderContext, PROMPT_TOKEN_MAX_CHARS};
