//! Append-only line patching for configuration files
//!
//! [`ensure_line`] never rewrites or removes existing content, so running it
//! any number of times leaves a file exactly as one run would.

use crate::resource::{Provider, Resource};
use crate::types::{Acquired, ResourceKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// What [`ensure_line`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// The file does not exist; its owning tool is not installed
    MissingFile,
    /// The marker (or the line itself) is already in the file
    AlreadyPresent,
    /// The line was appended
    Appended,
}

/// Make sure `line` is in the file at `path`.
///
/// - missing file: no-op
/// - file contains `marker` or `line`: no-op
/// - otherwise: append `line`, newline-terminated, on its own line
pub fn ensure_line(path: &Path, marker: &str, line: &str) -> Result<LineOutcome> {
    if !path.exists() {
        log::debug!("{} does not exist, not patching", path.display());
        return Ok(LineOutcome::MissingFile);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;

    if contains_marker(&content, marker, line) {
        return Ok(LineOutcome::AlreadyPresent);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }

    let mut appended = String::new();
    if !content.is_empty() && !content.ends_with('\n') {
        appended.push('\n');
    }
    appended.push_str(line.trim_end_matches('\n'));
    appended.push('\n');

    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open {} for append", path.display()))?;
    file.write_all(appended.as_bytes())
        .with_context(|| format!("Could not append to {}", path.display()))?;

    log::info!("Appended to {}: {}", path.display(), line.trim_end());
    Ok(LineOutcome::Appended)
}

fn contains_marker(content: &str, marker: &str, line: &str) -> bool {
    let line = line.trim_end_matches('\n');
    (!marker.is_empty() && content.contains(marker)) || content.lines().any(|l| l == line)
}

/// A line that must be present in a configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigLine {
    pub path: PathBuf,
    /// Substring whose presence means the file is already configured
    pub marker: String,
    pub line: String,
}

impl ConfigLine {
    pub fn new(path: impl Into<PathBuf>, marker: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            marker: marker.into(),
            line: line.into(),
        }
    }
}

impl ConfigLine {
    /// The text whose presence is checked: the marker, or the line itself
    fn probe_text(&self) -> &str {
        if self.marker.is_empty() {
            self.line.trim_end_matches('\n')
        } else {
            &self.marker
        }
    }
}

impl Resource for ConfigLine {
    fn id(&self) -> String {
        format!("{}#{}", self.path.display(), self.probe_text())
    }

    fn description(&self) -> String {
        format!("Ensure {} contains {:?}", self.path.display(), self.probe_text())
    }
}

/// Reconciles [`ConfigLine`]s with [`ensure_line`]
pub struct ConfigLineProvider;

impl Provider for ConfigLineProvider {
    type Item = ConfigLine;

    fn kind(&self) -> ResourceKind {
        ResourceKind::ConfigLine
    }

    fn installed(&self, desired: &[ConfigLine]) -> Result<BTreeSet<String>> {
        let mut present = BTreeSet::new();
        for item in desired {
            // Unreadable files fall through to acquire, which reports the error
            if let Ok(content) = fs::read_to_string(&item.path)
                && contains_marker(&content, &item.marker, &item.line)
            {
                present.insert(item.id());
            }
        }
        Ok(present)
    }

    fn acquire(&self, item: &ConfigLine) -> Result<Acquired> {
        match ensure_line(&item.path, &item.marker, &item.line)? {
            LineOutcome::MissingFile => Ok(Acquired::NotApplicable {
                reason: format!("{} does not exist", item.path.display()),
            }),
            LineOutcome::AlreadyPresent | LineOutcome::Appended => Ok(Acquired::Installed),
        }
    }
}
