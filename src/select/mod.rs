//! File selection
//!
//! Decides which remote entries to fetch from a host. An explicit list is
//! passed through untouched; a [`SelectionRule`] is evaluated against one
//! listing of the remote directory.

use crate::error::{Error, Result};
use crate::transfer::RemoteFs;
use crate::types::{MatchMode, RemoteFileSet, SelectionRule};
use regex::{Regex, RegexBuilder};
use tracing::{debug, error, info};

/// Picks remote files by explicit list or by prefix/month rule
#[derive(Debug, Clone, Default)]
pub struct FileSelector;

impl FileSelector {
    /// Create a selector
    pub fn new() -> Self {
        Self
    }

    /// Whether `name` satisfies `rule`
    pub fn matches(rule: &SelectionRule, name: &str) -> bool {
        match rule.mode {
            MatchMode::Substring => {
                name.contains(&rule.prefix)
                    && name.contains(&rule.month)
                    && name.to_lowercase().ends_with(".txt")
            }
            MatchMode::Regex => {
                Self::compile(rule).is_ok_and(|pattern| pattern.is_match(name))
            }
        }
    }

    /// Anchored, case-insensitive pattern for a rule.
    ///
    /// Prefix and month are matched literally.
    pub fn compile(rule: &SelectionRule) -> Result<Regex> {
        let pattern = format!(
            r"^{}.*{}.*\.txt$",
            regex::escape(&rule.prefix),
            regex::escape(&rule.month)
        );
        RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::invalid_value("file pattern", e.to_string()))
    }

    /// Files to fetch. Listing failures are logged and yield an empty set.
    pub fn select(&self, fs: &mut dyn RemoteFs, dir: &str, set: &RemoteFileSet) -> Vec<String> {
        match self.select_checked(fs, dir, set) {
            Ok(names) => names,
            Err(e) => {
                error!("Error listing remote files: {e}");
                Vec::new()
            }
        }
    }

    /// Like [`select`](Self::select), but keeps the listing failure
    pub fn select_checked(
        &self,
        fs: &mut dyn RemoteFs,
        dir: &str,
        set: &RemoteFileSet,
    ) -> Result<Vec<String>> {
        let rule = match set {
            RemoteFileSet::Explicit(names) => return Ok(names.clone()),
            RemoteFileSet::Rule(rule) => rule,
        };

        let entries = fs.list_dir(dir)?;
        debug!(dir, entries = entries.len(), "Listed remote directory");

        let selected: Vec<String> = match rule.mode {
            MatchMode::Substring => entries
                .into_iter()
                .filter(|name| Self::matches(rule, name))
                .collect(),
            MatchMode::Regex => {
                let pattern = Self::compile(rule)?;
                entries
                    .into_iter()
                    .filter(|name| pattern.is_match(name))
                    .collect()
            }
        };

        info!(
            "Files found with prefix '{}' and month '{}': {}",
            rule.prefix,
            rule.month,
            selected.len()
        );
        for name in &selected {
            info!("  - {name}");
        }

        Ok(selected)
    }
}
