//! A single provisioning run and the host it runs against

use crate::engine::gate::{AccountProbe, CliProbe};
use crate::git::{GitCli, Vcs};
use crate::sudo::PrivilegeSession;
use crate::system::{MacSystem, System};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use declarative::{NoProgress, ProgressCallback, ReconcileOptions, SudoProvider};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Options for a run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Report what would change without changing it
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub assume_yes: bool,
}

type PackageConnector = Box<dyn Fn() -> brewkit::Result<brewkit::Client>>;

/// External collaborators, swappable for tests
pub struct Host {
    pub system: Box<dyn System>,
    pub vcs: Box<dyn Vcs>,
    pub accounts: Box<dyn AccountProbe>,
    connect_packages: PackageConnector,
}

impl Host {
    pub fn new(
        system: Box<dyn System>,
        vcs: Box<dyn Vcs>,
        accounts: Box<dyn AccountProbe>,
        connect_packages: impl Fn() -> brewkit::Result<brewkit::Client> + 'static,
    ) -> Self {
        Self {
            system,
            vcs,
            accounts,
            connect_packages: Box::new(connect_packages),
        }
    }

    /// The real machine
    pub fn local() -> Self {
        Self::new(
            Box::new(MacSystem),
            Box::new(GitCli),
            Box::new(CliProbe),
            brewkit::Client::new,
        )
    }
}

pub struct Session<'h> {
    pub started: Instant,
    pub started_at: DateTime<Local>,
    pub options: RunOptions,
    pub host: &'h Host,
    pub privilege: PrivilegeSession,
    pub progress: Box<dyn ProgressCallback>,
    // Homebrew may only appear partway through the run
    packages: Option<Rc<brewkit::Client>>,
}

impl<'h> Session<'h> {
    pub fn new(host: &'h Host, privilege: PrivilegeSession, options: RunOptions) -> Self {
        Self {
            started: Instant::now(),
            started_at: Local::now(),
            options,
            host,
            privilege,
            progress: Box::new(NoProgress),
            packages: None,
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            dry_run: self.options.dry_run,
        }
    }

    /// Privileged execution, when privilege is held
    pub fn sudo(&self) -> Option<&dyn SudoProvider> {
        self.privilege
            .is_held()
            .then_some(&self.privilege as &dyn SudoProvider)
    }

    /// Package client, connected on first use
    pub fn packages(&mut self) -> Result<Rc<brewkit::Client>> {
        if let Some(client) = &self.packages {
            return Ok(Rc::clone(client));
        }
        let client = Rc::new((self.host.connect_packages)().context("Homebrew is not available")?);
        self.packages = Some(Rc::clone(&client));
        Ok(client)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::gate::tests::TableProbe;
    use crate::git::tests::FakeVcs;
    use crate::sudo::tests::FakeAuth;
    use crate::system::tests::FakeSystem;
    use brewkit::backend::Backend;
    use brewkit::{Package, PackageType, RetryConfig};
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};

    /// Package manager state shared by every client a host hands out
    #[derive(Clone, Default)]
    pub(crate) struct SharedBackend {
        pub installed: Arc<Mutex<BTreeSet<(PackageType, String)>>>,
        pub installs: Arc<Mutex<Vec<String>>>,
    }

    impl Backend for SharedBackend {
        fn is_available(&self) -> bool {
            true
        }

        fn install(&self, package: &Package) -> brewkit::Result<()> {
            self.installs.lock().unwrap().push(package.key().to_string());
            self.installed
                .lock()
                .unwrap()
                .insert((package.package_type, package.key().to_string()));
            Ok(())
        }

        fn list_installed(&self, package_type: PackageType) -> brewkit::Result<BTreeSet<String>> {
            Ok(self
                .installed
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, _)| *t == package_type)
                .map(|(_, k)| k.clone())
                .collect())
        }
    }

    pub(crate) fn fake_host(
        system: FakeSystem,
        probe: TableProbe,
        backend: SharedBackend,
    ) -> Host {
        Host::new(
            Box::new(system),
            Box::new(FakeVcs::default()),
            Box::new(probe),
            move || {
                Ok(brewkit::Client::with_backend(Box::new(backend.clone()))
                    .with_retry(RetryConfig::no_retry()))
            },
        )
    }

    pub(crate) fn fake_privilege() -> (Arc<FakeAuth>, PrivilegeSession) {
        let auth = Arc::new(FakeAuth::default());
        (auth.clone(), PrivilegeSession::new(auth))
    }

    #[test]
    fn test_packages_connect_once() {
        let backend = SharedBackend::default();
        let host = fake_host(FakeSystem::default(), TableProbe::default(), backend);
        let (_auth, privilege) = fake_privilege();
        let mut session = Session::new(&host, privilege, RunOptions::default());

        let first = session.packages().unwrap();
        let second = session.packages().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_sudo_only_when_held() {
        let host = fake_host(
            FakeSystem::default(),
            TableProbe::default(),
            SharedBackend::default(),
        );
        let (_auth, privilege) = fake_privilege();
        let session = Session::new(&host, privilege.clone(), RunOptions::default());

        assert!(session.sudo().is_none());
        privilege.acquire().unwrap();
        assert!(session.sudo().is_some());
    }

    #[test]
    fn test_reconcile_options_follow_dry_run() {
        let host = fake_host(
            FakeSystem::default(),
            TableProbe::default(),
            SharedBackend::default(),
        );
        let (_auth, privilege) = fake_privilege();
        let options = RunOptions {
            dry_run: true,
            assume_yes: false,
        };
        let session = Session::new(&host, privilege, options);
        assert!(session.reconcile_options().dry_run);
    }
}
