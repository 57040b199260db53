//! In-memory remote file system

use super::RemoteFs;
use crate::error::{Error, Result, TransferFailureKind};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Remote file system held in memory.
///
/// Files are keyed by their full remote path (`/dir/name`). Directories exist
/// implicitly through the files they contain.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: BTreeMap<String, Vec<u8>>,
    denied: BTreeSet<String>,
    unlistable: BTreeSet<String>,
    listings: usize,
    fetches: Vec<String>,
    closes: usize,
}

fn normalize_dir(dir: &str) -> String {
    let trimmed = dir.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

impl MemoryFs {
    /// Create an empty remote
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file at `path`
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    /// Make `path` exist but refuse reads
    #[must_use]
    pub fn with_denied(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.files.entry(path.clone()).or_default();
        self.denied.insert(path);
        self
    }

    /// Make listing `dir` fail
    #[must_use]
    pub fn with_unlistable_dir(mut self, dir: &str) -> Self {
        self.unlistable.insert(normalize_dir(dir));
        self
    }

    /// Number of directory listings performed
    pub fn listings(&self) -> usize {
        self.listings
    }

    /// Remote paths requested through `fetch`, in call order
    pub fn fetches(&self) -> &[String] {
        &self.fetches
    }

    /// Number of `close` calls
    pub fn closes(&self) -> usize {
        self.closes
    }
}

impl RemoteFs for MemoryFs {
    fn list_dir(&mut self, dir: &str) -> Result<Vec<String>> {
        self.listings += 1;
        let dir = normalize_dir(dir);
        if self.unlistable.contains(&dir) {
            return Err(Error::listing(dir, "permission denied"));
        }

        let prefix = if dir == "/" { dir.clone() } else { format!("{dir}/") };
        let names: Vec<String> = self
            .files
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(String::from)
            .collect();

        if names.is_empty() && !self.files.keys().any(|p| p.starts_with(&prefix)) {
            return Err(Error::listing(dir, "no such directory"));
        }
        Ok(names)
    }

    fn fetch(&mut self, remote: &str, local: &Path) -> Result<()> {
        self.fetches.push(remote.to_string());

        if self.denied.contains(remote) {
            return Err(Error::transfer(
                remote,
                TransferFailureKind::PermissionDenied,
                "permission denied",
            ));
        }
        let contents = self.files.get(remote).ok_or_else(|| {
            Error::transfer(remote, TransferFailureKind::NotFound, "no such file")
        })?;

        std::fs::write(local, contents).map_err(|e| {
            let _ = std::fs::remove_file(local);
            Error::transfer(remote, TransferFailureKind::Other, e.to_string())
        })
    }

    fn close(&mut self) -> Result<()> {
        self.closes += 1;
        Ok(())
    }
}
