use super::reconcile_into;
use crate::engine::gate::Account;
use crate::engine::{Session, Step, StepReport};
use crate::schema::StoreApp;
use anyhow::Result;
use brewkit::{Package, PackageProvider, PackageType};
use declarative::ReconcileSummary;

/// Mac App Store apps through `mas`, keyed on store id
pub struct StoreAppsStep {
    apps: Vec<Package>,
}

impl StoreAppsStep {
    pub fn new(apps: &[StoreApp]) -> Self {
        Self {
            apps: apps
                .iter()
                .map(|a| Package::mas(&a.name, &a.id))
                .collect(),
        }
    }
}

impl Step for StoreAppsStep {
    fn name(&self) -> &'static str {
        "store_apps"
    }

    fn description(&self) -> &'static str {
        "Install Mac App Store apps"
    }

    fn accounts(&self) -> Vec<Account> {
        if self.apps.is_empty() {
            Vec::new()
        } else {
            vec![Account::AppStore]
        }
    }

    fn run(&self, session: &mut Session<'_>) -> Result<StepReport> {
        if self.apps.is_empty() {
            return Ok(StepReport::noted("nothing declared"));
        }

        let client = session.packages()?;
        let provider = PackageProvider::new(&client, PackageType::Mas);
        let mut summary = ReconcileSummary::default();
        reconcile_into(self.name(), &provider, &self.apps, session, &mut summary);
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

    fn xcode() -> StoreApp {
        StoreApp {
            id: "497799835".into(),
            name: "Xcode".into(),
        }
    }

    #[test]
    fn test_gated_only_when_apps_declared() {
        assert!(StoreAppsStep::new(&[]).accounts().is_empty());
        assert_eq!(StoreAppsStep::new(&[xcode()]).accounts(), vec![Account::AppStore]);
    }

    #[test]
    fn test_installs_by_store_id() {
        let backend = SharedBackend::default();
        let host = fake_host(FakeSystem::default(), TableProbe::default(), backend.clone());
        let (_auth, privilege) = fake_privilege();
        let mut session = Session::new(&host, privilege, RunOptions::default());

        let step = StoreAppsStep::new(&[xcode()]);
        let report = step.run(&mut session).unwrap();
        assert_eq!(report.summary.installed, 1);
        assert_eq!(*backend.installs.lock().unwrap(), vec!["497799835"]);

        let again = step.run(&mut session).unwrap();
        assert_eq!(again.summary.present, 1);
    }
}
