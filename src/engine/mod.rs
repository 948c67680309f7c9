//! Provisioning engine
//!
//! The engine runs the pipeline:
//! 1. Session - one run's options, host collaborators, and privilege
//! 2. Gates - stop early when a sign-in is needed
//! 3. Orchestrator - steps in order, failure policy, final report

pub mod gate;
pub mod orchestrator;
pub mod policy;
pub mod session;
pub mod step;

pub use orchestrator::{
    LogObserver, Orchestrator, RunReport, RunState, StepObserver, StepOutcome, StepRecord,
};
pub use session::{Host, RunOptions, Session};
pub use step::{Step, StepReport};
