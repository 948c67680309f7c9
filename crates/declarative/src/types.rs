//! Core types for idempotent reconciliation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Output;

/// Kind of a managed resource.
///
/// Identifiers are unique within a kind, never across kinds: the formula
/// `git` and a repository directory named `git` are different resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Third-party package repository (e.g. a Homebrew tap)
    Tap,
    /// Command-line package (Homebrew formula)
    Formula,
    /// Bundled application (Homebrew cask)
    Cask,
    /// App store application, identified by its numeric store id
    StoreApp,
    /// Version-controlled source repository, identified by its directory name
    Repository,
    /// A line that must be present in a configuration file
    ConfigLine,
    /// An OS preference value
    Preference,
}

impl ResourceKind {
    /// Every kind, in the order the pipeline touches them
    pub const ALL: [Self; 7] = [
        Self::Tap,
        Self::Formula,
        Self::Cask,
        Self::ConfigLine,
        Self::StoreApp,
        Self::Preference,
        Self::Repository,
    ];

    /// Short stable name used in ids and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tap => "tap",
            Self::Formula => "formula",
            Self::Cask => "cask",
            Self::StoreApp => "store_app",
            Self::Repository => "repository",
            Self::ConfigLine => "config_line",
            Self::Preference => "preference",
        }
    }

    /// Severity of an acquisition failure for this kind.
    ///
    /// A single resource never takes the run down with it, whatever its kind.
    pub fn failure_severity(&self) -> Severity {
        Severity::NonFatal
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a failure affects the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Halts the whole run
    Fatal,
    /// Logged, the run continues
    NonFatal,
}

impl Severity {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }
}

/// A failure recorded during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Step name or `kind:id` of the resource that failed
    pub subject: String,
    pub message: String,
    pub severity: Severity,
}

impl FailureRecord {
    /// Failure of a single resource acquisition
    pub fn resource(kind: ResourceKind, id: &str, message: impl Into<String>) -> Self {
        Self {
            subject: format!("{kind}:{id}"),
            message: message.into(),
            severity: kind.failure_severity(),
        }
    }

    /// Failure of a whole step
    pub fn step(name: &str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            subject: name.to_string(),
            message: message.into(),
            severity,
        }
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Outcome of a single successful acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// The resource now exists
    Installed,
    /// Nothing to do for this resource on this host
    NotApplicable { reason: String },
}

/// Outcome of one desired identifier within a reconcile call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    AlreadyPresent,
    Installed,
    Skipped { reason: String },
    Planned,
    Failed { error: String },
}

/// Summary of one reconcile call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    /// Desired and already there
    pub present: usize,
    /// Acquired by this call
    pub installed: usize,
    /// Acquisition reported nothing to do
    pub skipped: usize,
    /// Would be acquired (dry run)
    pub planned: usize,
    /// Acquisition failed
    pub failed: usize,
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
}

impl ReconcileSummary {
    /// Add the outcome for one identifier
    pub fn add(&mut self, kind: ResourceKind, id: &str, outcome: &Outcome) {
        match outcome {
            Outcome::AlreadyPresent => self.present += 1,
            Outcome::Installed => self.installed += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Planned => self.planned += 1,
            Outcome::Failed { error } => {
                self.failed += 1;
                self.failures
                    .push(FailureRecord::resource(kind, id, error.clone()));
            }
        }
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: ReconcileSummary) {
        self.present += other.present;
        self.installed += other.installed;
        self.skipped += other.skipped;
        self.planned += other.planned;
        self.failed += other.failed;
        self.failures.extend(other.failures);
    }

    /// Total identifiers accounted for
    pub fn total(&self) -> usize {
        self.present + self.installed + self.skipped + self.planned + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} present, {} installed, {} failed",
            self.present, self.installed, self.failed
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.planned > 0 {
            write!(f, ", {} planned", self.planned)?;
        }
        Ok(())
    }
}

/// Options for a reconcile call
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Report what would be acquired without acquiring it
    pub dry_run: bool,
}

/// Output from a privileged command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}
