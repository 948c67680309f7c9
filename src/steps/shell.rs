use crate::engine::{Session, Step, StepReport};
use crate::paths;
use crate::schema::ShellConfig;
use anyhow::{Context, Result, bail};
use declarative::ReconcileSummary;

/// Registers the desired login shell in /etc/shells and switches to it
pub struct ShellStep {
    login: Option<String>,
}

impl ShellStep {
    pub fn new(config: &ShellConfig) -> Self {
        Self {
            login: config
                .login
                .as_deref()
                .map(|s| paths::expand(s).to_string_lossy().into_owned()),
        }
    }
}

impl Step for ShellStep {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn description(&self) -> &'static str {
        "Make the configured shell the login shell"
    }

    fn needs_privilege(&self) -> bool {
        self.login.is_some()
    }

    fn run(&self, session: &mut Session<'_>) -> Result<StepReport> {
        let Some(shell) = &self.login else {
            return Ok(StepReport::noted("no login shell declared"));
        };

        let host = session.host;
        let system = host.system.as_ref();
        let dry_run = session.options.dry_run;

        if !std::path::Path::new(shell).exists() {
            // Usually installed by the packages step, which a dry run skips
            if dry_run {
                return Ok(StepReport {
                    summary: ReconcileSummary {
                        planned: 1,
                        ..Default::default()
                    },
                    note: Some(format!("{shell} is not installed yet")),
                });
            }
            bail!("{shell} does not exist; add it to packages.formulas");
        }

        let registered = system.registered_shells()?.iter().any(|s| s == shell);
        let current = system.login_shell()?;
        if registered && current == *shell {
            return Ok(StepReport::from_summary(ReconcileSummary {
                present: 1,
                ..Default::default()
            }));
        }

        if dry_run {
            return Ok(StepReport {
                summary: ReconcileSummary {
                    planned: 1,
                    ..Default::default()
                },
                note: Some(format!("would switch from {current} to {shell}")),
            });
        }

        let sudo = session
            .sudo()
            .context("changing the login shell requires sudo")?;
        if !registered {
            system.register_shell(shell, sudo)?;
        }
        if current != *shell {
            system.set_login_shell(shell, sudo)?;
        }

        Ok(StepReport {
            summary: ReconcileSummary {
                installed: 1,
                ..Default::default()
            },
            note: Some(format!("{current} → {shell}, takes effect in new sessions")),
        })
    }
}
