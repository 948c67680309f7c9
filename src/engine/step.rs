use crate::engine::gate::Account;
use crate::engine::session::Session;
use anyhow::Result;
use declarative::ReconcileSummary;

/// What a step did
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub summary: ReconcileSummary,
    /// One-line remark for the summary (e.g. why nothing ran)
    pub note: Option<String>,
}

impl StepReport {
    pub fn from_summary(summary: ReconcileSummary) -> Self {
        Self {
            summary,
            note: None,
        }
    }

    pub fn noted(note: impl Into<String>) -> Self {
        Self {
            summary: ReconcileSummary::default(),
            note: Some(note.into()),
        }
    }
}

/// One named stage of the pipeline.
///
/// Running a step twice must leave the host as running it once did:
/// every step looks before it changes anything.
pub trait Step {
    /// Stable id, used by `--only`/`--skip` and the failure policy
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Accounts that must be signed in before this step runs
    fn accounts(&self) -> Vec<Account> {
        Vec::new()
    }

    fn needs_privilege(&self) -> bool {
        false
    }

    fn run(&self, session: &mut Session<'_>) -> Result<StepReport>;
}
