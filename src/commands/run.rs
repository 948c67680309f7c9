//! Run command - provision this machine from the declared config

use anyhow::{Context, Result};
use colored::Colorize;
use declarative::{LogProgress, ProgressCallback};
use std::path::{Path, PathBuf};

use crate::Context as AppContext;
use crate::cli::{RunArgs, StepSelection};
use crate::engine::gate::GateReport;
use crate::engine::{
    Host, LogObserver, Orchestrator, RunOptions, RunReport, RunState, Session, Step, StepObserver,
    StepOutcome, StepRecord,
};
use crate::paths;
use crate::progress::SpinnerProgress;
use crate::schema::ProvisionConfig;
use crate::signals::{self, InterruptFlag};
use crate::steps;
use crate::sudo::PrivilegeSession;
use crate::ui;

pub fn run(ctx: &AppContext, args: RunArgs) -> Result<i32> {
    let options = RunOptions {
        dry_run: args.dry_run,
        assume_yes: args.yes,
    };
    let title = if options.dry_run {
        "Groundwork - Dry Run"
    } else {
        "Groundwork - Provisioning"
    };
    execute(ctx, title, &args.selection, options)
}

/// Load, select, run, and summarize. Returns the process exit code.
pub(crate) fn execute(
    ctx: &AppContext,
    title: &str,
    selection: &StepSelection,
    options: RunOptions,
) -> Result<i32> {
    let config_path = resolve_config(selection.config.as_deref())?;
    let config = ProvisionConfig::load(&config_path)?;

    let pipeline = steps::build_pipeline(&config)?;
    let pipeline = steps::select_steps(pipeline, &selection.only, &selection.skip)?;

    if !ctx.quiet {
        ui::header(title);
        ui::kv("config", &config_path.display().to_string());
        ui::kv("declared", &config.declared_count().to_string());
        ui::kv(
            "steps",
            &pipeline
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(" → "),
        );
    }

    let privilege = PrivilegeSession::system();
    let interrupt = InterruptFlag::default();
    signals::install_handlers(interrupt.clone(), privilege.clone())
        .context("Failed to install signal handlers")?;

    let host = Host::local();
    let progress: Box<dyn ProgressCallback> = if ctx.quiet {
        Box::new(LogProgress)
    } else {
        Box::new(SpinnerProgress::new())
    };
    let mut session = Session::new(&host, privilege.clone(), options).with_progress(progress);
    let mut orchestrator = Orchestrator::new(pipeline, interrupt);

    let report = if ctx.quiet {
        orchestrator.run(&mut session, &mut LogObserver)
    } else {
        orchestrator.run(&mut session, &mut ConsoleObserver)
    };
    privilege.release();

    print_summary(&report);
    Ok(report.exit_code())
}

fn resolve_config(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(paths::expand(&path.to_string_lossy())),
        None => paths::config_file(),
    }
}

/// Step-by-step terminal output
struct ConsoleObserver;

impl StepObserver for ConsoleObserver {
    fn on_step_start(&mut self, index: usize, total: usize, step: &dyn Step) {
        println!();
        ui::step(index + 1, total, step.description());
    }

    fn on_step_complete(&mut self, record: &StepRecord) {
        let took = ui::format_duration(record.duration);
        match &record.outcome {
            StepOutcome::Done(report) => {
                if report.summary.total() > 0 {
                    ui::dim(&format!("{} ({took})", report.summary));
                }
                if let Some(note) = &report.note {
                    ui::dim(note);
                }
            }
            StepOutcome::Failed(failure) => {
                ui::error(&format!("{}: {}", record.name, failure.message));
            }
        }
    }

    fn on_gates_checked(&mut self, report: &GateReport) {
        if report.is_met() {
            log::info!(
                "signed in: {}",
                report
                    .checked
                    .iter()
                    .map(|a| a.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
}

fn print_summary(report: &RunReport) {
    ui::section("Summary");
    ui::kv(
        "started",
        &report.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    ui::kv("elapsed", &ui::format_duration(report.elapsed));
    ui::kv(
        "steps run",
        &format!(
            "{} ({} failed)",
            report.steps.len(),
            report
                .steps
                .iter()
                .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
                .count()
        ),
    );
    println!();

    match &report.state {
        RunState::Completed if report.failures.is_empty() => {
            if report.dry_run {
                ui::success("Dry run complete - nothing was changed");
            } else {
                ui::success("Machine is provisioned");
            }
        }
        RunState::Completed => {
            ui::warn(&format!(
                "Completed with {} failure(s); fix and re-run to retry:",
                report.failures.len()
            ));
        }
        RunState::Aborted {
            step,
            signal: Some(sig),
        } => {
            ui::warn(&format!("Interrupted (signal {sig}) before {}", step.bold()));
        }
        RunState::Aborted { step, signal: None } => {
            ui::error(&format!("Aborted at {}", step.bold()));
        }
        RunState::Halted { unmet } => {
            ui::warn("Sign in to the following, then re-run:");
            for gate in unmet {
                println!("  {} {}", "→".yellow(), gate.account.name().bold());
                ui::dim(&format!("  {}", gate.account.hint()));
                ui::dim(&format!("  ({})", gate.reason));
            }
        }
        RunState::Pending | RunState::Running(_) => {}
    }

    for failure in &report.failures {
        println!("  {} {}", "✗".red(), failure);
    }
}
