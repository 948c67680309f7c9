use super::reconcile_into;
use crate::engine::{Session, Step, StepReport};
use crate::schema::PackagesConfig;
use anyhow::Result;
use brewkit::{Package, PackageProvider, PackageType};
use declarative::ReconcileSummary;

/// Homebrew taps, then formulas, then casks
pub struct PackagesStep {
    taps: Vec<Package>,
    formulas: Vec<Package>,
    casks: Vec<Package>,
}

impl PackagesStep {
    pub fn new(config: &PackagesConfig) -> Self {
        Self {
            taps: config.taps.iter().map(Package::tap).collect(),
            formulas: config.formulas.iter().map(Package::brew).collect(),
            casks: config.casks.iter().map(Package::cask).collect(),
        }
    }

    fn declared(&self) -> usize {
        self.taps.len() + self.formulas.len() + self.casks.len()
    }
}

impl Step for PackagesStep {
    fn name(&self) -> &'static str {
        "packages"
    }

    fn description(&self) -> &'static str {
        "Install Homebrew taps, formulas, and casks"
    }

    // Some cask installers run pkg scripts as root
    fn needs_privilege(&self) -> bool {
        !self.casks.is_empty()
    }

    fn run(&self, session: &mut Session<'_>) -> Result<StepReport> {
        if self.declared() == 0 {
            return Ok(StepReport::noted("nothing declared"));
        }

        let client = match session.packages() {
            Ok(client) => client,
            Err(e) if session.options.dry_run => {
                log::debug!("{e:#}");
                return Ok(StepReport::noted(format!(
                    "Homebrew not installed yet, {} packages would be installed",
                    self.declared()
                )));
            }
            Err(e) => return Err(e),
        };

        let mut summary = ReconcileSummary::default();
        for (package_type, desired) in [
            (PackageType::Tap, &self.taps),
            (PackageType::Brew, &self.formulas),
            (PackageType::Cask, &self.casks),
        ] {
            let provider = PackageProvider::new(&client, package_type);
            reconcile_into(self.name(), &provider, desired, session, &mut summary);
        }

        Ok(StepReport::from_summary(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RunOptions;
    use crate::engine::gate::tests::TableProbe;
    use crate::engine::session::tests::{SharedBackend, fake_host, fake_privilege};
    use crate::system::tests::FakeSystem;

    fn config(formulas: &[&str], casks: &[&str]) -> PackagesConfig {
        PackagesConfig {
            taps: Vec::new(),
            formulas: formulas.iter().map(|s| (*s).to_string()).collect(),
            casks: casks.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn test_installs_only_missing() {
        let backend = SharedBackend::default();
        backend
            .installed
            .lock()
            .unwrap()
            .insert((PackageType::Brew, "jq".to_string()));
        let host = fake_host(FakeSystem::default(), TableProbe::default(), backend.clone());
        let (_auth, privilege) = fake_privilege();
        let mut session = Session::new(&host, privilege, RunOptions::default());

        let step = PackagesStep::new(&config(&["jq", "gh"], &[]));
        let report = step.run(&mut session).unwrap();

        assert_eq!(
            (
                report.summary.present,
                report.summary.installed,
                report.summary.failed
            ),
            (1, 1, 0)
        );
        assert_eq!(*backend.installs.lock().unwrap(), vec!["gh"]);

        let again = step.run(&mut session).unwrap();
        assert_eq!(again.summary.installed, 0);
        assert_eq!(backend.installs.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_tap_qualified_formula_matches_short_name() {
        let backend = SharedBackend::default();
        backend
            .installed
            .lock()
            .unwrap()
            .insert((PackageType::Brew, "terraform".to_string()));
        let host = fake_host(FakeSystem::default(), TableProbe::default(), backend.clone());
        let (_auth, privilege) = fake_privilege();
        let mut session = Session::new(&host, privilege, RunOptions::default());

        let step = PackagesStep::new(&config(&["hashicorp/tap/terraform"], &["firefox"]));
        let report = step.run(&mut session).unwrap();

        assert_eq!(report.summary.present, 1);
        assert_eq!(*backend.installs.lock().unwrap(), vec!["firefox"]);
    }

    #[test]
    fn test_dry_run_installs_nothing() {
        let backend = SharedBackend::default();
        let host = fake_host(FakeSystem::default(), TableProbe::default(), backend.clone());
        let (_auth, privilege) = fake_privilege();
        let options = RunOptions {
            dry_run: true,
            assume_yes: false,
        };
        let mut session = Session::new(&host, privilege, options);

        let report = PackagesStep::new(&config(&["jq"], &["firefox"]))
            .run(&mut session)
            .unwrap();

        assert_eq!(report.summary.planned, 2);
        assert!(backend.installs.lock().unwrap().is_empty());
    }

    #[test]
    fn test_nothing_declared() {
        let host = fake_host(
            FakeSystem::default(),
            TableProbe::default(),
            SharedBackend::default(),
        );
        let (_auth, privilege) = fake_privilege();
        let mut session = Session::new(&host, privilege, RunOptions::default());

        let report = PackagesStep::new(&PackagesConfig::default())
            .run(&mut session)
            .unwrap();
        assert_eq!(report.summary.total(), 0);
    }
}
