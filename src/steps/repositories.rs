use super::reconcile_into;
use crate::engine::gate::Account;
use crate::engine::{Session, Step, StepReport};
use crate::git::{RepoEntry, RepoProvider};
use crate::paths;
use crate::schema::RepositoriesConfig;
use anyhow::Result;
use declarative::ReconcileSummary;
use std::path::PathBuf;

/// Clones declared repositories that have no directory yet
pub struct RepositoriesStep {
    root: PathBuf,
    accounts: Vec<Account>,
    entries: Vec<RepoEntry>,
}

impl RepositoriesStep {
    pub fn new(config: &RepositoriesConfig) -> Result<Self> {
        let accounts = config
            .accounts
            .iter()
            .map(|a| a.parse::<Account>())
            .collect::<Result<_>>()?;
        Ok(Self {
            root: paths::expand(&config.root),
            accounts,
            entries: config
                .entries
                .iter()
                .map(|e| RepoEntry::new(&e.dir, &e.remote, e.branch.as_deref()))
                .collect(),
        })
    }
}

impl Step for RepositoriesStep {
    fn name(&self) -> &'static str {
        "repositories"
    }

    fn description(&self) -> &'static str {
        "Clone source repositories"
    }

    fn accounts(&self) -> Vec<Account> {
        if self.entries.is_empty() {
            Vec::new()
        } else {
            self.accounts.clone()
        }
    }

    fn run(&self, session: &mut Session<'_>) -> Result<StepReport> {
        if self.entries.is_empty() {
            return Ok(StepReport::noted("nothing declared"));
        }

        let host = session.host;
        let provider = RepoProvider::new(host.vcs.as_ref(), &self.root);
        let mut summary = ReconcileSummary::default();
        reconcile_into(self.name(), &provider, &self.entries, session, &mut summary);
        Ok(StepReport::from_summary(summary))
    }
}
