//! Reconciliation engine - diff a desired set against the installed set and
//! acquire the difference

use crate::context::ProgressCallback;
use crate::resource::{Provider, Resource};
use crate::types::{Acquired, Outcome, ReconcileOptions, ReconcileSummary, ResourceKind};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that stop a reconcile call before any acquisition
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The bulk "what is installed" query failed
    #[error("could not list installed {kind} resources: {message}")]
    Inventory { kind: ResourceKind, message: String },
}

/// Reconcile `desired` against what `provider` reports as installed.
///
/// The installed set is queried once. Missing items are acquired in
/// declared order; duplicates are collapsed to their first occurrence. A
/// failed acquisition is recorded in the summary and the next item is
/// still attempted.
pub fn reconcile<P, C>(
    provider: &P,
    desired: &[P::Item],
    opts: ReconcileOptions,
    progress: &mut C,
) -> Result<ReconcileSummary, ReconcileError>
where
    P: Provider,
    C: ProgressCallback + ?Sized,
{
    let kind = provider.kind();
    let mut summary = ReconcileSummary::default();

    if desired.is_empty() {
        return Ok(summary);
    }

    let installed = provider
        .installed(desired)
        .map_err(|e| ReconcileError::Inventory {
            kind,
            message: format!("{e:#}"),
        })?;

    let mut seen = HashSet::new();
    let unique: Vec<&P::Item> = desired.iter().filter(|r| seen.insert(r.id())).collect();
    let missing = unique
        .iter()
        .filter(|r| !installed.contains(&r.id()))
        .count();

    progress.on_reconcile_start(kind, unique.len(), missing);

    for item in unique {
        let id = item.id();
        let outcome = if installed.contains(&id) {
            Outcome::AlreadyPresent
        } else if opts.dry_run {
            Outcome::Planned
        } else {
            progress.on_resource_start(kind, &id);
            acquire_one(provider, item)
        };

        progress.on_resource_complete(kind, &id, &outcome);
        summary.add(kind, &id, &outcome);
    }

    progress.on_reconcile_complete(kind);
    log::debug!("{kind}: {summary}");

    Ok(summary)
}

fn acquire_one<P: Provider>(provider: &P, item: &P::Item) -> Outcome {
    match provider.acquire(item) {
        Ok(Acquired::Installed) => Outcome::Installed,
        Ok(Acquired::NotApplicable { reason }) => Outcome::Skipped { reason },
        Err(e) => Outcome::Failed {
            error: format!("{e:#}"),
        },
    }
}
