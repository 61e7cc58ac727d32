//! Command-line interface for batchforge.
//!
//! Provides the `image` and `video` batch commands.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
