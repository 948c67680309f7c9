//! Source repositories: checkouts that must exist under a root directory.
//!
//! An existing directory satisfies its entry. Nothing is fetched or pulled,
//! so a checkout that drifted from its remote, or a clone interrupted
//! without cleanup, still counts as present.

use anyhow::{Context, Result, bail};
use declarative::{Acquired, Provider, Resource, ResourceKind};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Version-control operations
pub trait Vcs {
    fn exists(&self, path: &Path) -> bool;

    fn clone_repo(&self, remote: &str, branch: Option<&str>, path: &Path) -> Result<()>;
}

/// [`Vcs`] backed by the `git` binary
pub struct GitCli;

impl Vcs for GitCli {
    fn exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn clone_repo(&self, remote: &str, branch: Option<&str>, path: &Path) -> Result<()> {
        let mut cmd = Command::new("git");
        cmd.arg("clone");
        if let Some(branch) = branch {
            cmd.args(["--branch", branch]);
        }
        cmd.arg(remote).arg(path);
        log::debug!("{cmd:?}");

        let output = cmd.output().context("Failed to execute git clone")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{}", stderr.trim());
        }
        Ok(())
    }
}

/// One declared checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntry {
    /// Directory name under the root, unique
    pub dir: String,
    pub remote: String,
    pub branch: Option<String>,
}

impl RepoEntry {
    pub fn new(dir: &str, remote: &str, branch: Option<&str>) -> Self {
        Self {
            dir: dir.to_string(),
            remote: remote.to_string(),
            branch: branch.map(str::to_string),
        }
    }
}

impl Resource for RepoEntry {
    fn id(&self) -> String {
        self.dir.clone()
    }

    fn description(&self) -> String {
        match &self.branch {
            Some(branch) => format!("Clone {} ({branch}) into {}", self.remote, self.dir),
            None => format!("Clone {} into {}", self.remote, self.dir),
        }
    }
}

/// Provider cloning entries into `root`
pub struct RepoProvider<'a> {
    vcs: &'a dyn Vcs,
    root: PathBuf,
}

impl<'a> RepoProvider<'a> {
    pub fn new(vcs: &'a dyn Vcs, root: impl Into<PathBuf>) -> Self {
        Self {
            vcs,
            root: root.into(),
        }
    }

    fn path_of(&self, entry: &RepoEntry) -> PathBuf {
        self.root.join(&entry.dir)
    }
}

impl Provider for RepoProvider<'_> {
    type Item = RepoEntry;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Repository
    }

    fn installed(&self, desired: &[RepoEntry]) -> Result<BTreeSet<String>> {
        Ok(desired
            .iter()
            .filter(|e| self.vcs.exists(&self.path_of(e)))
            .map(|e| e.dir.clone())
            .collect())
    }

    fn acquire(&self, entry: &RepoEntry) -> Result<Acquired> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Could not create {}", self.root.display()))?;

        let path = self.path_of(entry);
        if let Err(e) = self
            .vcs
            .clone_repo(&entry.remote, entry.branch.as_deref(), &path)
        {
            // Clean up partial clone so the next run retries it
            if path.exists()
                && let Err(cleanup) = fs::remove_dir_all(&path)
            {
                log::warn!(
                    "Could not remove partial clone at {}: {cleanup}",
                    path.display()
                );
                return Err(e.context(format!(
                    "partial clone left at {}; remove it before re-running",
                    path.display()
                )));
            }
            return Err(e);
        }
        Ok(Acquired::Installed)
    }
}
