//! Common types used throughout the extractor
//!
//! Hosts, file selection rules and per-host transfer outcomes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Standard SSH/SFTP port
pub const DEFAULT_SFTP_PORT: u16 = 22;

// ============================================================================
// Hosts
// ============================================================================

/// One remote file-transfer endpoint plus the client credential to use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTarget {
    /// Address of the SFTP server
    pub address: String,
    /// SSH port
    pub port: u16,
    /// Login user
    pub user: String,
    /// Name used in logs and summaries (e.g. `HOST_CE`)
    pub display_name: String,
    /// Private key file
    pub credential_path: PathBuf,
}

impl HostTarget {
    /// Create a host target on the standard port
    pub fn new(
        address: impl Into<String>,
        user: impl Into<String>,
        display_name: impl Into<String>,
        credential_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            address: address.into(),
            port: DEFAULT_SFTP_PORT,
            user: user.into(),
            display_name: display_name.into(),
            credential_path: credential_path.into(),
        }
    }

    /// Local directory this host's files are written to.
    ///
    /// Hosts named `HOST_<X>` get their own `<base>/<X>` subdirectory.
    pub fn local_dir(&self, base: &Path) -> PathBuf {
        match self.display_name.strip_prefix("HOST_") {
            Some(suffix) if !suffix.is_empty() => base.join(suffix),
            _ => base.to_path_buf(),
        }
    }
}

// ============================================================================
// File Selection
// ============================================================================

/// How a selection rule is evaluated against remote file names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Prefix and month must occur anywhere, extension must be `.txt`
    #[default]
    Substring,
    /// Anchored case-insensitive `^<prefix>.*<month>.*\.txt$`
    Regex,
}

/// Prefix/month rule used to pick files from a remote listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRule {
    /// Required file prefix
    pub prefix: String,
    /// Required month token (e.g. `202601`)
    pub month: String,
    /// Evaluation mode
    pub mode: MatchMode,
}

impl SelectionRule {
    /// Create a new selection rule
    pub fn new(prefix: impl Into<String>, month: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            prefix: prefix.into(),
            month: month.into(),
            mode,
        }
    }
}

/// Files to fetch from one host: an exact list or a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteFileSet {
    /// Exact file names, fetched without listing the directory
    Explicit(Vec<String>),
    /// Names picked from a directory listing
    Rule(SelectionRule),
}

// ============================================================================
// Outcomes
// ============================================================================

/// What happened on one host during one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    /// Display name of the host
    pub host: String,
    /// Remote address
    pub address: String,
    /// Whether the host was reached and its files enumerated
    pub connected: bool,
    /// Files fetched, in request order
    pub downloaded: Vec<String>,
    /// Files that could not be fetched, in request order
    pub failed: Vec<String>,
    /// Reason for a host-level failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferOutcome {
    /// Outcome for a host whose files were enumerated
    pub fn completed(host: &HostTarget, downloaded: Vec<String>, failed: Vec<String>) -> Self {
        Self {
            host: host.display_name.clone(),
            address: host.address.clone(),
            connected: true,
            downloaded,
            failed,
            error: None,
        }
    }

    /// Outcome for a host that could not be processed
    pub fn unreachable(host: &HostTarget, failed: Vec<String>, error: impl Into<String>) -> Self {
        Self {
            host: host.display_name.clone(),
            address: host.address.clone(),
            connected: false,
            downloaded: Vec::new(),
            failed,
            error: Some(error.into()),
        }
    }

    /// Status label used in summaries
    pub fn status(&self) -> &'static str {
        if self.connected {
            "OK"
        } else {
            "FAILED"
        }
    }
}

/// Outcomes of one extraction run, in host order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    /// One entry per configured host
    pub outcomes: Vec<TransferOutcome>,
}

impl ExtractionReport {
    /// Total files downloaded across hosts
    pub fn total_downloaded(&self) -> usize {
        self.outcomes.iter().map(|o| o.downloaded.len()).sum()
    }

    /// Total files failed across hosts
    pub fn total_failed(&self) -> usize {
        self.outcomes.iter().map(|o| o.failed.len()).sum()
    }

    /// Hosts that could not be processed
    pub fn unreachable_hosts(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.outcomes.iter().filter(|o| !o.connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_dir_strips_host_prefix() {
        let host = HostTarget::new("10.0.0.1", "sftpce", "HOST_CE", "/keys/ce");
        assert_eq!(
            host.local_dir(Path::new("./archives")),
            PathBuf::from("./archives/CE")
        );
    }

    #[test]
    fn test_local_dir_without_prefix() {
        let host = HostTarget::new("10.0.0.1", "user", "reporting", "/keys/k");
        assert_eq!(
            host.local_dir(Path::new("./archives")),
            PathBuf::from("./archives")
        );

        let bare = HostTarget::new("10.0.0.1", "user", "HOST_", "/keys/k");
        assert_eq!(bare.local_dir(Path::new("/d")), PathBuf::from("/d"));
    }

    #[test]
    fn test_report_totals() {
        let host = HostTarget::new("h", "u", "HOST_CE", "/k");
        let report = ExtractionReport {
            outcomes: vec![
                TransferOutcome::completed(
                    &host,
                    vec!["a".to_string(), "b".to_string()],
                    vec!["c".to_string()],
                ),
                TransferOutcome::unreachable(&host, vec!["d".to_string()], "auth"),
            ],
        };
        assert_eq!(report.total_downloaded(), 2);
        assert_eq!(report.total_failed(), 2);
        assert_eq!(report.unreachable_hosts().count(), 1);
        assert_eq!(report.outcomes[0].status(), "OK");
        assert_eq!(report.outcomes[1].status(), "FAILED");
    }

    #[test]
    fn test_outcome_serializes_without_empty_error() {
        let host = HostTarget::new("h", "u", "HOST_CE", "/k");
        let json = serde_json::to_value(TransferOutcome::completed(&host, vec![], vec![])).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["connected"], true);
    }
}
