//! Provider traits for privileged execution and progress reporting
//!
//! These let the reconciler run without depending on a specific sudo
//! implementation or terminal UI.

use crate::types::{CommandOutput, Outcome, ResourceKind};
use anyhow::Result;

/// Provider for elevated privilege operations
///
/// The implementation owns acquisition and release; callers only run
/// commands through it.
pub trait SudoProvider: Send + Sync {
    /// Run a command with elevated privileges
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run a command and return just success/failure
    fn run_status(&self, cmd: &str, args: &[&str]) -> Result<bool> {
        Ok(self.run(cmd, args)?.success)
    }

    /// Run a command and capture stdout
    fn run_capture(&self, cmd: &str, args: &[&str]) -> Result<String> {
        let output = self.run(cmd, args)?;
        if !output.success {
            anyhow::bail!("Command failed: {}", output.stderr_str().trim());
        }
        Ok(output.stdout_str())
    }
}

/// Progress callback for reconcile calls
pub trait ProgressCallback {
    /// Called once the installed set is known and acquisition begins
    fn on_reconcile_start(&mut self, kind: ResourceKind, desired: usize, missing: usize);

    /// Called before acquiring a missing resource
    fn on_resource_start(&mut self, kind: ResourceKind, id: &str);

    /// Called with the outcome of every desired identifier
    fn on_resource_complete(&mut self, kind: ResourceKind, id: &str, outcome: &Outcome);

    /// Called when the reconcile call is done
    fn on_reconcile_complete(&mut self, kind: ResourceKind);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_reconcile_start(&mut self, _kind: ResourceKind, _desired: usize, _missing: usize) {}
    fn on_resource_start(&mut self, _kind: ResourceKind, _id: &str) {}
    fn on_resource_complete(&mut self, _kind: ResourceKind, _id: &str, _outcome: &Outcome) {}
    fn on_reconcile_complete(&mut self, _kind: ResourceKind) {}
}

/// Progress callback that only logs
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_reconcile_start(&mut self, kind: ResourceKind, desired: usize, missing: usize) {
        log::info!("{kind}: {desired} desired, {missing} missing");
    }

    fn on_resource_start(&mut self, kind: ResourceKind, id: &str) {
        log::debug!("{kind}: acquiring {id}");
    }

    fn on_resource_complete(&mut self, kind: ResourceKind, id: &str, outcome: &Outcome) {
        match outcome {
            Outcome::Failed { error } => log::warn!("{kind}: {id} failed: {error}"),
            other => log::debug!("{kind}: {id} -> {other:?}"),
        }
    }

    fn on_reconcile_complete(&mut self, _kind: ResourceKind) {}
}
