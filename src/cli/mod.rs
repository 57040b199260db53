//! CLI module
//!
//! Command-line interface for the extractor.
//!
//! # Commands
//!
//! - `extract` - Download the batch files from every configured host
//! - `etl` - Reconcile downloaded files and load them into the sink
//! - `ordens-filhas` - Clean the fixed-format "ordens filhas" file
//! - `test-sftp` / `test-sftp-regex` - Password pulls by prefix and month

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, PullArgs};
pub use runner::Runner;

use tracing_subscriber::EnvFilter;

/// Log filter for the binary.
///
/// A non-empty, valid `RUST_LOG` wins; otherwise `--verbose` picks DEBUG
/// over the INFO default.
pub fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}
