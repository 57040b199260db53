//! Zip expansion

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn corrupt(archive: &Path, message: impl std::fmt::Display) -> Error {
    Error::ArchiveCorrupt {
        path: archive.to_path_buf(),
        message: message.to_string(),
    }
}

/// Whether `name` is an archive the orchestrator expands
pub fn is_zip(name: &str) -> bool {
    name.to_lowercase().ends_with(".zip")
}

/// Write every entry of `archive` under `dest`.
///
/// Returns the files written. The archive itself is left in place; the
/// caller removes it once expansion has succeeded.
pub fn expand_zip(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| corrupt(archive, e))?;
    std::fs::create_dir_all(dest)?;

    let mut written = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| corrupt(archive, e))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut out = BufWriter::new(File::create(&target)?);
        std::io::copy(&mut entry, &mut out).map_err(|e| corrupt(archive, e))?;
        out.flush()?;

        debug!(path = %target.display(), "Extracted archive entry");
        written.push(target);
    }

    Ok(written)
}
