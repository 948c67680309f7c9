//! Failure policy: which failures end the run.
//!
//! Only losing privilege is fatal. Everything later in the pipeline
//! assumes it, and prompting again mid-run is not allowed. Resource
//! severities live with the kinds in `declarative::ResourceKind`.

use declarative::Severity;

/// Steps whose failure is not the default `NonFatal`
pub const STEP_POLICY: &[(&str, Severity)] = &[("privilege", Severity::Fatal)];

/// Severity of a failed step
pub fn step_severity(step: &str) -> Severity {
    STEP_POLICY
        .iter()
        .find(|(name, _)| *name == step)
        .map_or(Severity::NonFatal, |(_, severity)| *severity)
}
