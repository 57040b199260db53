//! Error types for the ENEL SFTP extractor
//!
//! This module defines the error hierarchy for the entire crate.
//! Most component boundaries log these and hand back a sentinel instead of
//! propagating them; only gate failures, a missing reconciliation directory
//! and sink failures end a run.

use std::path::PathBuf;
use thiserror::Error;

/// Why a single remote file could not be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFailureKind {
    /// Remote file does not exist
    NotFound,
    /// Remote side refused access
    PermissionDenied,
    /// Anything else (network, local disk, protocol)
    Other,
}

impl std::fmt::Display for TransferFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::Other => write!(f, "transfer error"),
        }
    }
}

/// The main error type
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    // ============================================================================
    // Network Gate Errors
    // ============================================================================
    #[error("Network gate not connected after {waited_secs}s")]
    GateTimeout { waited_secs: u64 },

    #[error("Failed to launch connection manager '{path}': {message}")]
    GateLaunch { path: String, message: String },

    // ============================================================================
    // Credential and Session Errors
    // ============================================================================
    #[error("Credential unreadable at {path}: {reason}")]
    CredentialUnreadable { path: PathBuf, reason: String },

    #[error("Authentication rejected by {host}")]
    AuthenticationRejected { host: String },

    #[error("SSH protocol failure with {host}: {message}")]
    Protocol { host: String, message: String },

    #[error("Connection to {host} failed: {message}")]
    Connection { host: String, message: String },

    // ============================================================================
    // Remote File Errors
    // ============================================================================
    #[error("Failed to list remote directory '{dir}': {message}")]
    Listing { dir: String, message: String },

    #[error("Failed to fetch '{remote}' ({kind}): {message}")]
    Transfer {
        remote: String,
        kind: TransferFailureKind,
        message: String,
    },

    #[error("Corrupt archive {path}: {message}")]
    ArchiveCorrupt { path: PathBuf, message: String },

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Source directory does not exist: {path}")]
    SourceDirMissing { path: PathBuf },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Database error: {message}")]
    Database { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a credential error
    pub fn credential(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CredentialUnreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a listing error
    pub fn listing(dir: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Listing {
            dir: dir.into(),
            message: message.into(),
        }
    }

    /// Create a transfer error
    pub fn transfer(
        remote: impl Into<String>,
        kind: TransferFailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Transfer {
            remote: remote.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
