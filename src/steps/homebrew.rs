use crate::engine::{Session, Step, StepReport};
use crate::ui;
use anyhow::{Context, Result, bail};
use declarative::ReconcileSummary;

/// Installs Homebrew when it is missing
pub struct HomebrewStep;

impl Step for HomebrewStep {
    fn name(&self) -> &'static str {
        "homebrew"
    }

    fn description(&self) -> &'static str {
        "Install Homebrew if it is missing"
    }

    // The installer calls sudo itself
    fn needs_privilege(&self) -> bool {
        true
    }

    fn run(&self, session: &mut Session<'_>) -> Result<StepReport> {
        let host = session.host;
        let system = host.system.as_ref();

        if system.brew_installed() {
            return Ok(StepReport::from_summary(ReconcileSummary {
                present: 1,
                ..Default::default()
            }));
        }

        if session.options.dry_run {
            return Ok(StepReport {
                summary: ReconcileSummary {
                    planned: 1,
                    ..Default::default()
                },
                note: Some("would install Homebrew".into()),
            });
        }

        ui::info("Homebrew is not installed.");

        if !session.options.assume_yes {
            let confirmed = dialoguer::Confirm::new()
                .with_prompt("Install Homebrew now?")
                .default(true)
                .interact()
                .context("Failed to read confirmation")?;

            if !confirmed {
                bail!("Homebrew installation declined");
            }
        }

        ui::info("Installing Homebrew...");
        system.install_homebrew(session.options.assume_yes)?;
        ui::success("Homebrew installed");

        Ok(StepReport::from_summary(ReconcileSummary {
            installed: 1,
            ..Default::default()
        }))
    }
}
