// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # ENEL SFTP extractor
//!
//! Retrieves daily batch files from ENEL's SFTP hosts behind a VPN gate,
//! reconciles the downloaded pipe-delimited files into one table and loads
//! it into a relational sink.
//!
//! ## Features
//!
//! - **VPN gate**: detects the GlobalProtect adapter and waits for the operator to connect
//! - **Key and password auth**: OpenSSH/PEM keys in RSA, Ed25519, ECDSA order, or passwords
//! - **Selection**: exact file lists, or prefix + month by substring or anchored regex
//! - **Partial failure**: every file and every host is accounted for, none aborts the run
//! - **Reconciliation**: heterogeneous files projected onto one Arrow schema
//! - **Sink**: DuckDB, or PostgreSQL/MySQL/SQLite through DuckDB
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use enel_sftp::config::ExtractorConfig;
//! use enel_sftp::gate::NetworkGate;
//! use enel_sftp::pipeline::run_extraction;
//! use enel_sftp::transfer::SftpConnector;
//!
//! fn main() -> enel_sftp::Result<()> {
//!     let config = ExtractorConfig::from_env()?;
//!     let gate = NetworkGate::global_protect(config.gate.clone());
//!
//!     let report = run_extraction(&config, Some(&gate), &SftpConnector::new())?;
//!     println!("downloaded {}", report.total_downloaded());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Pipeline                                │
//! │  gate → [credential → session → select → download → close]* →   │
//! │  gate teardown          reconcile → sink                         │
//! └──────────────────────────────────────────────────────────────────┘
//!                                 │
//! ┌──────────┬────────────┬───────┴────┬────────────┬────────────────┐
//! │   Gate   │ Credential │  Transfer  │  Download  │   Reconcile    │
//! ├──────────┼────────────┼────────────┼────────────┼────────────────┤
//! │ Probe    │ OpenSSH    │ ssh2 SFTP  │ Per-file   │ Pipe-delimited │
//! │ Launch   │ PEM        │ In-memory  │ Zip expand │ Arrow          │
//! │ Teardown │ .ppk hint  │            │            │ DuckDB sink    │
//! └──────────┴────────────┴────────────┴────────────┴────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the extractor
pub mod error;

/// Common types and type aliases
pub mod types;

/// Environment-based configuration
pub mod config;

/// VPN gate
pub mod gate;

/// Private key loading
pub mod credential;

/// Remote file sessions
pub mod transfer;

/// Remote file selection
pub mod select;

/// Download orchestration and archive expansion
pub mod download;

/// Schema reconciliation
pub mod reconcile;

/// Fixed-format batch files
pub mod processing;

/// Relational sink via DuckDB
pub mod sink;

/// Run orchestration
pub mod pipeline;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use pipeline::{process_host, run_etl, run_extraction, run_password_pull, EtlOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
