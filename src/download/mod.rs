//! Download orchestration
//!
//! Fetches each selected file into the host's local directory, expands zip
//! archives in place and keeps per-file bookkeeping. A failed file never
//! stops the loop.

pub mod archive;

use crate::error::Result;
use crate::transfer::RemoteFs;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{error, info, warn};

/// Per-file result of one download pass, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    /// Files written locally
    pub downloaded: Vec<String>,
    /// Files that could not be fetched
    pub failed: Vec<String>,
}

impl DownloadReport {
    /// Number of files attempted
    pub fn attempted(&self) -> usize {
        self.downloaded.len() + self.failed.len()
    }
}

/// Join a remote directory and file name using `/` regardless of the
/// separators either side was written with
pub fn join_remote(dir: &str, name: &str) -> String {
    let dir = dir.replace('\\', "/");
    let name = name.replace('\\', "/");
    if dir.is_empty() {
        name
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Drop repeated names, keeping the first occurrence of each
pub fn unique_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Fetch every distinct target from `remote_dir` into `local_dir`.
///
/// The local directory is created if needed. Zip archives are expanded
/// into `local_dir` and removed; an archive that fails to expand stays on
/// disk and still counts as downloaded.
pub fn download_all(
    fs: &mut dyn RemoteFs,
    remote_dir: &str,
    targets: &[String],
    local_dir: &Path,
) -> Result<DownloadReport> {
    std::fs::create_dir_all(local_dir)?;

    let mut report = DownloadReport::default();
    for name in &unique_names(targets) {
        let remote = join_remote(remote_dir, name);
        let local = local_dir.join(name);

        info!("Downloading: {remote}");
        match fs.fetch(&remote, &local) {
            Ok(()) => {
                info!("Downloaded: {name}");
                report.downloaded.push(name.clone());
            }
            Err(e) => {
                error!(file = %name, "Failed to download {remote}: {e}");
                report.failed.push(name.clone());
                continue;
            }
        }

        if archive::is_zip(name) {
            expand_in_place(&local, local_dir);
        }
    }

    info!(
        "Download finished: {} succeeded, {} failed",
        report.downloaded.len(),
        report.failed.len()
    );
    Ok(report)
}

fn expand_in_place(archive_path: &Path, dest: &Path) {
    info!("Extracting {}", archive_path.display());
    match archive::expand_zip(archive_path, dest) {
        Ok(files) => {
            info!("Extracted {} file(s) to {}", files.len(), dest.display());
            match std::fs::remove_file(archive_path) {
                Ok(()) => info!("Removed archive {}", archive_path.display()),
                Err(e) => warn!("Could not remove archive {}: {e}", archive_path.display()),
            }
        }
        Err(e) => error!("Error extracting {}: {e}", archive_path.display()),
    }
}
