//! The step catalog, in dependency order:
//! privilege → homebrew → packages → shell → config → store_apps →
//! preferences → repositories

mod config;
mod homebrew;
mod packages;
mod preferences;
mod privilege;
mod repositories;
mod shell;
mod store_apps;

use crate::engine::policy::step_severity;
use crate::engine::{Session, Step};
use crate::schema::ProvisionConfig;
use anyhow::{Result, bail};
use declarative::{FailureRecord, Provider, ReconcileSummary, reconcile};

pub use config::ConfigStep;
pub use homebrew::HomebrewStep;
pub use packages::PackagesStep;
pub use preferences::PreferencesStep;
pub use privilege::PrivilegeStep;
pub use repositories::RepositoriesStep;
pub use shell::ShellStep;
pub use store_apps::StoreAppsStep;

/// Step names in pipeline order
pub const STEP_NAMES: [&str; 8] = [
    "privilege",
    "homebrew",
    "packages",
    "shell",
    "config",
    "store_apps",
    "preferences",
    "repositories",
];

/// Every step, configured from `config`, in pipeline order
pub fn build_pipeline(config: &ProvisionConfig) -> Result<Vec<Box<dyn Step>>> {
    let steps: Vec<Box<dyn Step>> = vec![
        Box::new(PrivilegeStep::new(&config.privilege)),
        Box::new(HomebrewStep),
        Box::new(PackagesStep::new(&config.packages)),
        Box::new(ShellStep::new(&config.shell)),
        Box::new(ConfigStep::new(&config.config_lines)),
        Box::new(StoreAppsStep::new(&config.store_apps)),
        Box::new(PreferencesStep::new(&config.defaults, &config.privilege)?),
        Box::new(RepositoriesStep::new(&config.repositories)?),
    ];
    Ok(steps)
}

/// Map user-facing aliases to step names
pub fn normalize_step(name: &str) -> &str {
    match name {
        "sudo" => "privilege",
        "brew" => "homebrew",
        "taps" | "formulas" | "casks" => "packages",
        "dotfiles" | "config_lines" | "configs" => "config",
        "mas" | "apps" | "store-apps" => "store_apps",
        "defaults" | "prefs" => "preferences",
        "repos" => "repositories",
        other => other,
    }
}

/// Narrow the pipeline to `only` (when given) minus `skip`, keeping order.
///
/// The privilege step stays whenever a selected step needs it.
pub fn select_steps(
    steps: Vec<Box<dyn Step>>,
    only: &[String],
    skip: &[String],
) -> Result<Vec<Box<dyn Step>>> {
    let only = normalize_all(only)?;
    let skip = normalize_all(skip)?;

    let selected: Vec<bool> = steps
        .iter()
        .map(|s| (only.is_empty() || only.contains(&s.name())) && !skip.contains(&s.name()))
        .collect();

    let privilege_needed = steps
        .iter()
        .zip(&selected)
        .any(|(s, keep)| *keep && s.needs_privilege());

    Ok(steps
        .into_iter()
        .zip(selected)
        .filter(|(s, keep)| *keep || (privilege_needed && s.name() == "privilege"))
        .map(|(s, _)| s)
        .collect())
}

fn normalize_all(names: &[String]) -> Result<Vec<&'static str>> {
    names
        .iter()
        .map(|n| {
            let normalized = normalize_step(n.trim());
            match STEP_NAMES.iter().find(|s| **s == normalized) {
                Some(name) => Ok(*name),
                None => bail!(
                    "Unknown step '{}'. Available: {}",
                    n.trim(),
                    STEP_NAMES.join(", ")
                ),
            }
        })
        .collect()
}

/// Reconcile one kind into `summary`.
///
/// A failed inventory query becomes a failure of `step` and the step
/// carries on with its next kind.
fn reconcile_into<P: Provider>(
    step: &str,
    provider: &P,
    desired: &[P::Item],
    session: &mut Session<'_>,
    summary: &mut ReconcileSummary,
) {
    let opts = session.reconcile_options();
    match reconcile(provider, desired, opts, session.progress.as_mut()) {
        Ok(result) => summary.merge(result),
        Err(e) => {
            log::warn!("{step}: {e}");
            summary
                .failures
                .push(FailureRecord::step(step, e.to_string(), step_severity(step)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(steps: &[Box<dyn Step>]) -> Vec<&'static str> {
        steps.iter().map(|s| s.name()).collect()
    }

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn sudo_config() -> ProvisionConfig {
        ProvisionConfig::parse(
            r#"
[shell]
login = "/opt/homebrew/bin/fish"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_pipeline_order() {
        let steps = build_pipeline(&ProvisionConfig::default()).unwrap();
        assert_eq!(names(&steps), STEP_NAMES.to_vec());
    }

    #[test]
    fn test_only_keeps_order() {
        let steps = build_pipeline(&ProvisionConfig::default()).unwrap();
        let selected = select_steps(steps, &strings(&["repos", "config"]), &[]).unwrap();
        assert_eq!(names(&selected), vec!["config", "repositories"]);
    }

    #[test]
    fn test_skip() {
        let steps = build_pipeline(&ProvisionConfig::default()).unwrap();
        let selected =
            select_steps(steps, &[], &strings(&["defaults", "mas", "repos"])).unwrap();
        assert_eq!(
            names(&selected),
            vec!["privilege", "homebrew", "packages", "shell", "config"]
        );
    }

    #[test]
    fn test_privilege_kept_when_needed() {
        let steps = build_pipeline(&sudo_config()).unwrap();
        let selected = select_steps(steps, &strings(&["shell"]), &strings(&["sudo"])).unwrap();
        assert_eq!(names(&selected), vec!["privilege", "shell"]);
    }

    #[test]
    fn test_homebrew_bootstrap_pulls_in_privilege() {
        let steps = build_pipeline(&ProvisionConfig::default()).unwrap();
        let selected = select_steps(steps, &strings(&["brew"]), &[]).unwrap();
        assert_eq!(names(&selected), vec!["privilege", "homebrew"]);
    }

    #[test]
    fn test_privilege_dropped_when_not_needed() {
        let steps = build_pipeline(&ProvisionConfig::default()).unwrap();
        let selected = select_steps(steps, &strings(&["config"]), &[]).unwrap();
        assert_eq!(names(&selected), vec!["config"]);
    }

    #[test]
    fn test_unknown_step_rejected() {
        let steps = build_pipeline(&ProvisionConfig::default()).unwrap();
        let err = select_steps(steps, &strings(&["nope"]), &[]).err().unwrap();
        assert!(err.to_string().contains("Unknown step 'nope'"));
    }
}
