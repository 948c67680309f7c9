//! # Declarative
//!
//! Idempotent reconciliation of declared resource sets.
//!
//! ## Core Concepts
//!
//! - **Resource**: a value naming something that should exist (a package, an
//!   app, a repository checkout, a line in a config file)
//! - **Provider**: the kind-specific strategy that lists what exists and
//!   acquires what does not
//! - **reconcile**: one bulk "what is installed" query, then acquisition of
//!   the difference, with per-resource fault isolation
//! - **ensure_line**: append-only config patching, safe to repeat
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{reconcile, NoProgress, ReconcileOptions};
//!
//! let summary = reconcile(&formulas, &desired, ReconcileOptions::default(), &mut NoProgress)?;
//! println!("{summary}");
//! for failure in &summary.failures {
//!     eprintln!("{failure}");
//! }
//! ```
//!
//! ## Provider Traits
//!
//! - [`Provider`]: existence and acquisition for one resource kind
//! - [`SudoProvider`]: elevated privilege execution
//! - [`ProgressCallback`]: progress updates during reconciliation

pub mod context;
pub mod line;
pub mod reconcile;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{LogProgress, NoProgress, ProgressCallback, SudoProvider};
pub use line::{ConfigLine, ConfigLineProvider, LineOutcome, ensure_line};
pub use reconcile::{ReconcileError, reconcile};
pub use resource::{Provider, Resource};
pub use types::{
    Acquired, CommandOutput, FailureRecord, Outcome, ReconcileOptions, ReconcileSummary,
    ResourceKind, Severity,
};
