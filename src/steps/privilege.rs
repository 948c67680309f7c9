use crate::engine::{Session, Step, StepReport};
use crate::schema::PrivilegeConfig;
use crate::ui;
use anyhow::Result;
use std::time::Duration;

/// Acquires sudo once and keeps it alive for the rest of the run
pub struct PrivilegeStep {
    keepalive: Duration,
}

impl PrivilegeStep {
    pub fn new(config: &PrivilegeConfig) -> Self {
        Self {
            keepalive: Duration::from_secs(config.keepalive_secs),
        }
    }
}

impl Step for PrivilegeStep {
    fn name(&self) -> &'static str {
        "privilege"
    }

    fn description(&self) -> &'static str {
        "Ask for the sudo password once and keep it cached"
    }

    fn needs_privilege(&self) -> bool {
        true
    }

    fn run(&self, session: &mut Session<'_>) -> Result<StepReport> {
        if session.options.dry_run {
            return Ok(StepReport::noted("dry run, sudo not requested"));
        }
        if session.privilege.is_held() {
            return Ok(StepReport::noted("already held"));
        }

        ui::dim("Sudo is needed for Homebrew, the login shell, and system preferences.");
        session.privilege.acquire()?;
        session.privilege.maintain(self.keepalive)?;

        Ok(StepReport::noted(format!(
            "held, refreshed every {}s",
            self.keepalive.as_secs()
        )))
    }
}
