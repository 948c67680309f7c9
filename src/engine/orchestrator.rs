//! Ordered step execution with failure policy and account gates

use crate::engine::gate::{Account, GateReport, UnmetGate, check_account_gates};
use crate::engine::policy::step_severity;
use crate::engine::session::Session;
use crate::engine::step::{Step, StepReport};
use crate::signals::{InterruptFlag, exit_code_for};
use chrono::{DateTime, Local};
use declarative::FailureRecord;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Where the pipeline is, or where it stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running(usize),
    /// Every step ran; non-fatal failures may have been recorded
    Completed,
    /// Stopped before `step` by a fatal failure or a signal
    Aborted { step: String, signal: Option<i32> },
    /// Waiting on out-of-band sign-ins; not a failure
    Halted { unmet: Vec<UnmetGate> },
}

#[derive(Debug, Clone)]
pub enum StepOutcome {
    Done(StepReport),
    Failed(FailureRecord),
}

#[derive(Debug, Clone)]
pub struct StepRecord {
    pub name: &'static str,
    pub outcome: StepOutcome,
    pub duration: Duration,
}

/// Everything the final summary needs
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub steps: Vec<StepRecord>,
    /// Every failure, step-level and resource-level, in the order seen
    pub failures: Vec<FailureRecord>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        match &self.state {
            RunState::Completed | RunState::Halted { .. } => 0,
            RunState::Aborted {
                signal: Some(sig), ..
            } => exit_code_for(*sig),
            RunState::Aborted { signal: None, .. } => 1,
            RunState::Pending | RunState::Running(_) => 1,
        }
    }
}

/// Hooks for reporting progress through the pipeline
pub trait StepObserver {
    fn on_step_start(&mut self, index: usize, total: usize, step: &dyn Step);
    fn on_step_complete(&mut self, record: &StepRecord);
    fn on_gates_checked(&mut self, report: &GateReport);
}

/// Observer that only logs
pub struct LogObserver;

impl StepObserver for LogObserver {
    fn on_step_start(&mut self, index: usize, total: usize, step: &dyn Step) {
        log::info!("[{}/{}] {}", index + 1, total, step.name());
    }

    fn on_step_complete(&mut self, record: &StepRecord) {
        match &record.outcome {
            StepOutcome::Done(report) => log::info!("{}: {}", record.name, report.summary),
            StepOutcome::Failed(failure) => log::warn!("{failure}"),
        }
    }

    fn on_gates_checked(&mut self, report: &GateReport) {
        for gate in &report.unmet {
            log::warn!("gate unmet: {gate}");
        }
    }
}

pub struct Orchestrator {
    steps: Vec<Box<dyn Step>>,
    interrupt: InterruptFlag,
    state: RunState,
}

impl Orchestrator {
    pub fn new(steps: Vec<Box<dyn Step>>, interrupt: InterruptFlag) -> Self {
        Self {
            steps,
            interrupt,
            state: RunState::Pending,
        }
    }

    /// Accounts needed by the steps from `index` on
    fn accounts_from(&self, index: usize) -> Vec<Account> {
        self.steps[index..]
            .iter()
            .flat_map(|s| s.accounts())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Run every step in order and report how far the pipeline got
    pub fn run(&mut self, session: &mut Session<'_>, observer: &mut dyn StepObserver) -> RunReport {
        let total = self.steps.len();
        let mut records = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut gates_checked = false;

        for index in 0..total {
            let name = self.steps[index].name();

            if let Some(signal) = self.interrupt.signal() {
                self.state = RunState::Aborted {
                    step: name.to_string(),
                    signal: Some(signal),
                };
                break;
            }

            if !gates_checked && !self.steps[index].accounts().is_empty() {
                gates_checked = true;
                let accounts = self.accounts_from(index);
                let report = check_account_gates(session.host.accounts.as_ref(), &accounts);
                observer.on_gates_checked(&report);
                if !report.is_met() {
                    self.state = RunState::Halted {
                        unmet: report.unmet,
                    };
                    break;
                }
            }

            self.state = RunState::Running(index);
            let step = self.steps[index].as_ref();
            observer.on_step_start(index, total, step);

            let started = Instant::now();
            let outcome = match step.run(session) {
                Ok(report) => {
                    failures.extend(report.summary.failures.iter().cloned());
                    StepOutcome::Done(report)
                }
                Err(e) => {
                    let failure = FailureRecord::step(name, format!("{e:#}"), step_severity(name));
                    failures.push(failure.clone());
                    StepOutcome::Failed(failure)
                }
            };

            let record = StepRecord {
                name,
                outcome,
                duration: started.elapsed(),
            };
            observer.on_step_complete(&record);

            let fatal = match &record.outcome {
                StepOutcome::Failed(f) => f.severity.is_fatal(),
                StepOutcome::Done(report) => {
                    report.summary.failures.iter().any(|f| f.severity.is_fatal())
                }
            };
            records.push(record);

            if fatal {
                self.state = RunState::Aborted {
                    step: name.to_string(),
                    signal: None,
                };
                break;
            }
        }

        if matches!(self.state, RunState::Pending | RunState::Running(_)) {
            self.state = RunState::Completed;
        }

        RunReport {
            state: self.state.clone(),
            started_at: session.started_at,
            elapsed: session.elapsed(),
            steps: records,
            failures,
            dry_run: session.options.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gate::tests::TableProbe;
    use crate::engine::session::RunOptions;
    use crate::engine::session::tests::{SharedBackend, fake_host, fake_privilege};
    use crate::system::tests::FakeSystem;
    use anyhow::bail;
    use declarative::{ReconcileSummary, ResourceKind, Severity};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    enum Behavior {
        Succeed,
        PartlyFail,
        Error,
        Interrupt(InterruptFlag, i32),
    }

    struct ScriptedStep {
        name: &'static str,
        behavior: Behavior,
        accounts: Vec<Account>,
        log: Log,
    }

    impl Step for ScriptedStep {
        fn name(&self) -> &'static str {
            self.name
        }

        fn description(&self) -> &'static str {
            "scripted"
        }

        fn accounts(&self) -> Vec<Account> {
            self.accounts.clone()
        }

        fn run(&self, _session: &mut Session<'_>) -> anyhow::Result<StepReport> {
            self.log.borrow_mut().push(self.name);
            match &self.behavior {
                Behavior::Succeed => Ok(StepReport::default()),
                Behavior::PartlyFail => {
                    let mut summary = ReconcileSummary::default();
                    summary.add(
                        ResourceKind::Cask,
                        "not-a-cask",
                        &declarative::Outcome::Failed {
                            error: "package not found".into(),
                        },
                    );
                    Ok(StepReport::from_summary(summary))
                }
                Behavior::Error => bail!("{} broke", self.name),
                Behavior::Interrupt(flag, sig) => {
                    flag.raise(*sig);
                    Ok(StepReport::default())
                }
            }
        }
    }

    fn step(name: &'static str, behavior: Behavior, log: &Log) -> Box<dyn Step> {
        gated(name, behavior, &[], log)
    }

    fn gated(
        name: &'static str,
        behavior: Behavior,
        accounts: &[Account],
        log: &Log,
    ) -> Box<dyn Step> {
        Box::new(ScriptedStep {
            name,
            behavior,
            accounts: accounts.to_vec(),
            log: Rc::clone(log),
        })
    }

    fn run_pipeline(
        steps: Vec<Box<dyn Step>>,
        probe: TableProbe,
        interrupt: InterruptFlag,
    ) -> RunReport {
        let host = fake_host(FakeSystem::default(), probe, SharedBackend::default());
        let (_auth, privilege) = fake_privilege();
        let mut session = Session::new(&host, privilege, RunOptions::default());
        let mut orchestrator = Orchestrator::new(steps, interrupt);
        orchestrator.run(&mut session, &mut LogObserver)
    }

    #[test]
    fn test_fatal_failure_stops_pipeline() {
        let log = Log::default();
        let report = run_pipeline(
            vec![
                step("privilege", Behavior::Error, &log),
                step("packages", Behavior::Succeed, &log),
            ],
            TableProbe::default(),
            InterruptFlag::default(),
        );

        assert_eq!(*log.borrow(), vec!["privilege"]);
        assert_eq!(
            report.state,
            RunState::Aborted {
                step: "privilege".into(),
                signal: None
            }
        );
        assert_eq!(report.failures[0].severity, Severity::Fatal);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_non_fatal_failures_continue() {
        let log = Log::default();
        let report = run_pipeline(
            vec![
                step("privilege", Behavior::Succeed, &log),
                step("packages", Behavior::PartlyFail, &log),
                step("shell", Behavior::Error, &log),
                step("config", Behavior::Succeed, &log),
            ],
            TableProbe::default(),
            InterruptFlag::default(),
        );

        assert_eq!(*log.borrow(), vec!["privilege", "packages", "shell", "config"]);
        assert_eq!(report.state, RunState::Completed);
        let subjects: Vec<_> = report.failures.iter().map(|f| f.subject.as_str()).collect();
        assert_eq!(subjects, vec!["cask:not-a-cask", "shell"]);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_unmet_gate_halts_before_gated_step() {
        let log = Log::default();
        let report = run_pipeline(
            vec![
                step("privilege", Behavior::Succeed, &log),
                gated("store_apps", Behavior::Succeed, &[Account::AppStore], &log),
                gated("repositories", Behavior::Succeed, &[Account::GitHub], &log),
            ],
            TableProbe::signed_in(&[Account::AppStore]),
            InterruptFlag::default(),
        );

        assert_eq!(*log.borrow(), vec!["privilege"]);
        match &report.state {
            RunState::Halted { unmet } => {
                assert_eq!(unmet.len(), 1);
                assert_eq!(unmet[0].account, Account::GitHub);
            }
            other => panic!("expected halt, got {other:?}"),
        }
        assert!(report.failures.is_empty());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_met_gates_run_everything() {
        let log = Log::default();
        let report = run_pipeline(
            vec![
                gated("store_apps", Behavior::Succeed, &[Account::AppStore], &log),
                gated("repositories", Behavior::Succeed, &[Account::GitHub], &log),
            ],
            TableProbe::signed_in(&[Account::AppStore, Account::GitHub]),
            InterruptFlag::default(),
        );

        assert_eq!(log.borrow().len(), 2);
        assert_eq!(report.state, RunState::Completed);
    }

    #[test]
    fn test_interrupt_stops_at_next_step() {
        let log = Log::default();
        let flag = InterruptFlag::default();
        let report = run_pipeline(
            vec![
                step("privilege", Behavior::Succeed, &log),
                step("packages", Behavior::Interrupt(flag.clone(), 2), &log),
                step("shell", Behavior::Succeed, &log),
            ],
            TableProbe::default(),
            flag,
        );

        assert_eq!(*log.borrow(), vec!["privilege", "packages"]);
        assert_eq!(
            report.state,
            RunState::Aborted {
                step: "shell".into(),
                signal: Some(2)
            }
        );
        assert_eq!(report.exit_code(), 130);
    }

    #[test]
    fn test_empty_pipeline_completes() {
        let report = run_pipeline(Vec::new(), TableProbe::default(), InterruptFlag::default());
        assert_eq!(report.state, RunState::Completed);
        assert!(report.steps.is_empty());
    }
}
