//! Terminal progress for reconcile calls.

use colored::Colorize;
use declarative::{Outcome, ProgressCallback, ResourceKind};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while missing resources are acquired.
///
/// Failures are printed above the spinner as they happen; everything else
/// ends up in the step summary.
#[derive(Default)]
pub struct SpinnerProgress {
    bar: Option<ProgressBar>,
    missing: usize,
    done: usize,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn spinner() -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

impl ProgressCallback for SpinnerProgress {
    fn on_reconcile_start(&mut self, kind: ResourceKind, desired: usize, missing: usize) {
        log::debug!("{kind}: {desired} desired, {missing} missing");
        self.missing = missing;
        self.done = 0;
        if missing > 0 {
            self.bar = Some(Self::spinner());
        }
    }

    fn on_resource_start(&mut self, kind: ResourceKind, id: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!(
                "[{}/{}] {kind} {id}",
                self.done + 1,
                self.missing
            ));
        }
    }

    fn on_resource_complete(&mut self, kind: ResourceKind, id: &str, outcome: &Outcome) {
        match outcome {
            Outcome::AlreadyPresent => return,
            Outcome::Failed { error } => {
                let line = format!("  {} {kind} {id}: {error}", "✗".red());
                match &self.bar {
                    Some(bar) => bar.println(line),
                    None => eprintln!("{line}"),
                }
            }
            Outcome::Planned => println!("  {} would install {kind} {id}", "→".cyan()),
            Outcome::Installed | Outcome::Skipped { .. } => {}
        }
        self.done += 1;
    }

    fn on_reconcile_complete(&mut self, _kind: ResourceKind) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
