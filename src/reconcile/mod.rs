//! Schema reconciliation
//!
//! Merges downloaded pipe-delimited files whose column sets differ into one
//! table with a fixed column order.
//!
//! # Overview
//!
//! - `DelimitedReader` - splits text into a header and rows of raw text
//! - `ReconciledTable` - Arrow-backed result, all columns nullable text
//! - `SchemaReconciler` - walks a directory, projects every file onto the
//!   expected columns and concatenates the results

pub mod delimited;
mod table;

pub use delimited::{Delimited, DelimitedError, DelimitedReader};
pub use table::{text_schema, ReconciledTable};

use crate::error::{Error, Result};
use arrow::datatypes::SchemaRef;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Provenance column appended after the expected columns
pub const SOURCE_FILE_COLUMN: &str = "source_file";

/// Whether `path` has a `.txt` extension, in any case
fn is_text_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("txt"))
}

/// Project parsed rows onto `expected`, tagging each with `source`.
///
/// Missing columns become null, unknown columns are dropped.
pub fn project(parsed: &Delimited, expected: &[String], source: &str) -> Vec<Vec<Option<String>>> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (index, name) in parsed.columns.iter().enumerate() {
        positions.entry(name.as_str()).or_insert(index);
    }
    let mapping: Vec<Option<usize>> = expected
        .iter()
        .map(|name| positions.get(name.as_str()).copied())
        .collect();

    parsed
        .rows
        .iter()
        .map(|row| {
            let mut out: Vec<Option<String>> = mapping
                .iter()
                .map(|slot| slot.and_then(|i| row.get(i).cloned().flatten()))
                .collect();
            out.push(Some(source.to_string()));
            out
        })
        .collect()
}

/// Reconciles a directory of delimited files into one table
#[derive(Debug, Clone, Default)]
pub struct SchemaReconciler {
    reader: DelimitedReader,
}

impl SchemaReconciler {
    /// Reconciler for pipe-delimited UTF-8 files with a header row
    pub fn new() -> Self {
        Self::default()
    }

    /// `.txt` files under `base_dir`, recursively, in sorted path order
    pub fn find_files(base_dir: &Path) -> Result<Vec<PathBuf>> {
        if !base_dir.is_dir() {
            return Err(Error::SourceDirMissing {
                path: base_dir.to_path_buf(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(base_dir).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_text_file(entry.path()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable entry under {}: {e}", base_dir.display()),
            }
        }
        Ok(files)
    }

    /// Read one file projected onto `expected` plus the provenance column
    pub fn read_file(&self, path: &Path, expected: &[String]) -> Result<ReconciledTable> {
        let body = std::fs::read_to_string(path).map_err(|e| Error::parse(path, e.to_string()))?;
        let parsed = self
            .reader
            .parse(&body)
            .map_err(|e| Error::parse(path, e.to_string()))?;

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rows = project(&parsed, expected, &source);

        ReconciledTable::from_rows(Self::output_schema(expected), &rows)
    }

    /// Output schema: `expected` followed by the provenance column
    pub fn output_schema(expected: &[String]) -> SchemaRef {
        let mut columns = expected.to_vec();
        columns.push(SOURCE_FILE_COLUMN.to_string());
        text_schema(&columns)
    }

    /// Reconcile every `.txt` file under `base_dir`.
    ///
    /// Returns `Ok(None)` when no file was found or none could be parsed,
    /// and `Err(SourceDirMissing)` when `base_dir` does not exist.
    pub fn reconcile(
        &self,
        base_dir: &Path,
        expected: &[String],
    ) -> Result<Option<ReconciledTable>> {
        let files = Self::find_files(base_dir)?;
        if files.is_empty() {
            warn!("No .txt files found in {}", base_dir.display());
            return Ok(None);
        }
        info!("Found {} file(s) to process", files.len());

        let mut tables = Vec::with_capacity(files.len());
        for path in &files {
            match self.read_file(path, expected) {
                Ok(table) => {
                    debug!(file = %path.display(), rows = table.num_rows(), "Read file");
                    tables.push(table);
                }
                Err(e) => error!("Error reading {}: {e}", path.display()),
            }
        }

        if tables.is_empty() {
            warn!("No file could be parsed");
            return Ok(None);
        }

        let combined = ReconciledTable::concat(&Self::output_schema(expected), &tables)?;
        info!(
            "Reconciled {} row(s) from {} file(s)",
            combined.num_rows(),
            tables.len()
        );
        Ok(Some(combined))
    }
}
