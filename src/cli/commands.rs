//! CLI commands and argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// ENEL SFTP extraction and loading
#[derive(Parser, Debug)]
#[command(name = "enel-sftp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the batch files from every configured host
    Extract,

    /// Reconcile downloaded reading-effectiveness files and load them
    Etl,

    /// Clean the "ordens filhas" batch file
    OrdensFilhas {
        /// Input file (defaults to the standard download location)
        #[arg(long)]
        arquivo: Option<PathBuf>,
    },

    /// Password pull selecting files by substring match
    TestSftp(PullArgs),

    /// Password pull selecting files by anchored regex
    TestSftpRegex(PullArgs),
}

/// Overrides for the password-authenticated pulls
#[derive(Args, Debug, Clone, Default)]
pub struct PullArgs {
    /// Month token the file name must contain (e.g. 202601)
    #[arg(long)]
    pub file_month: Option<String>,

    /// Prefix the file name must contain
    #[arg(long)]
    pub file_prefix: Option<String>,

    /// Local download directory
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Remote directory to list
    #[arg(long)]
    pub remote_path: Option<String>,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
