//! Host operating system: Homebrew bootstrap, login shell, preferences

use crate::runner;
use crate::schema::{PreferenceValue, split_domain_key};
use anyhow::{Context, Result, bail};
use declarative::{Acquired, Provider, Resource, ResourceKind, SudoProvider};
use std::collections::BTreeSet;

const HOMEBREW_INSTALL_URL: &str =
    "https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh";

const SHELLS_FILE: &str = "/etc/shells";

/// Operating-system operations the pipeline needs
pub trait System {
    /// Whether a Homebrew installation can be found
    fn brew_installed(&self) -> bool;

    /// Run the official Homebrew installer
    fn install_homebrew(&self, noninteractive: bool) -> Result<()>;

    /// Current user's login shell
    fn login_shell(&self) -> Result<String>;

    /// Shells listed as valid login shells
    fn registered_shells(&self) -> Result<Vec<String>>;

    fn register_shell(&self, shell: &str, sudo: &dyn SudoProvider) -> Result<()>;

    fn set_login_shell(&self, shell: &str, sudo: &dyn SudoProvider) -> Result<()>;

    /// Raw `defaults read` output, `None` when the key is unset
    fn read_default(&self, domain: &str, key: &str) -> Result<Option<String>>;

    fn write_default(
        &self,
        domain: &str,
        key: &str,
        value: &PreferenceValue,
        sudo: Option<&dyn SudoProvider>,
    ) -> Result<()>;
}

/// [`System`] backed by the macOS command-line tools
pub struct MacSystem;

impl System for MacSystem {
    fn brew_installed(&self) -> bool {
        brewkit::Client::new().is_ok_and(|c| c.is_available())
    }

    fn install_homebrew(&self, noninteractive: bool) -> Result<()> {
        let env = if noninteractive { "NONINTERACTIVE=1 " } else { "" };
        let script = format!(
            r#"script="$(curl -fsSL {HOMEBREW_INSTALL_URL})" && {env}/bin/bash -c "$script""#
        );

        let status = runner::run("/bin/bash", &["-c", &script])
            .context("Failed to run Homebrew install script")?;
        if !status.success() {
            bail!("Homebrew install script exited with status {status}");
        }

        if !self.brew_installed() {
            bail!(
                "Homebrew install script succeeded but `brew` is still not found.\n\
                 You may need to add Homebrew to your PATH and restart your shell."
            );
        }
        Ok(())
    }

    fn login_shell(&self) -> Result<String> {
        let user = current_user()?;
        let path = format!("/Users/{user}");
        match runner::run_capture("dscl", &[".", "-read", &path, "UserShell"]) {
            Ok(out) => parse_user_shell(&out)
                .with_context(|| format!("Unexpected dscl output: {out}")),
            Err(e) => {
                log::debug!("dscl unavailable ({e:#}), falling back to $SHELL");
                std::env::var("SHELL").context("Could not determine login shell")
            }
        }
    }

    fn registered_shells(&self) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(SHELLS_FILE)
            .with_context(|| format!("Could not read {SHELLS_FILE}"))?;
        Ok(parse_shells(&content))
    }

    fn register_shell(&self, shell: &str, sudo: &dyn SudoProvider) -> Result<()> {
        if shell.contains('\'') || shell.contains('\n') {
            bail!("Refusing to register shell path with quotes or newlines: {shell}");
        }
        let append = format!("echo '{shell}' >> {SHELLS_FILE}");
        sudo.run_capture("sh", &["-c", &append])
            .with_context(|| format!("Failed to add {shell} to {SHELLS_FILE}"))?;
        Ok(())
    }

    fn set_login_shell(&self, shell: &str, sudo: &dyn SudoProvider) -> Result<()> {
        let user = current_user()?;
        sudo.run_capture("chsh", &["-s", shell, &user])
            .with_context(|| format!("Failed to change login shell to {shell}"))?;
        Ok(())
    }

    fn read_default(&self, domain: &str, key: &str) -> Result<Option<String>> {
        let output = runner::run_output("defaults", &["read", domain, key])?;
        if !output.status.success() {
            // Key doesn't exist
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    fn write_default(
        &self,
        domain: &str,
        key: &str,
        value: &PreferenceValue,
        sudo: Option<&dyn SudoProvider>,
    ) -> Result<()> {
        let value_str = value.to_arg();
        let args = ["write", domain, key, value.type_flag(), &value_str];

        let (success, stderr) = match sudo {
            Some(sudo) => {
                let output = sudo.run("defaults", &args)?;
                (output.success, output.stderr_str())
            }
            None => {
                let output = runner::run_output("defaults", &args)?;
                (
                    output.status.success(),
                    String::from_utf8_lossy(&output.stderr).to_string(),
                )
            }
        };

        if !success {
            bail!("defaults write failed: {}", stderr.trim());
        }
        Ok(())
    }
}

fn current_user() -> Result<String> {
    std::env::var("USER").or_else(|_| runner::run_capture("id", &["-un"]))
}

/// `UserShell: /bin/zsh` -> `/bin/zsh`
fn parse_user_shell(dscl: &str) -> Option<String> {
    dscl.lines()
        .find_map(|l| l.strip_prefix("UserShell:"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Non-comment, non-blank lines of /etc/shells
fn parse_shells(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Preferences
// ============================================================================

/// A single `defaults` key that should hold a value
#[derive(Debug, Clone)]
pub struct Preference {
    /// Domain (e.g., "com.apple.finder")
    pub domain: String,
    /// Key (e.g., "ShowPathbar")
    pub key: String,
    pub value: PreferenceValue,
    /// Written through sudo
    pub requires_sudo: bool,
}

impl Preference {
    pub fn new(domain: &str, key: &str, value: PreferenceValue) -> Self {
        Self {
            domain: domain.to_string(),
            key: key.to_string(),
            value,
            requires_sudo: false,
        }
    }

    pub fn with_sudo(mut self, requires: bool) -> Self {
        self.requires_sudo = requires;
        self
    }

    /// Parse "domain.key" format
    pub fn from_domain_key(domain_key: &str, value: PreferenceValue) -> Result<Self> {
        let (domain, key) = split_domain_key(domain_key)?;
        Ok(Self::new(domain, key, value))
    }
}

impl Resource for Preference {
    fn id(&self) -> String {
        format!("{}.{}", self.domain, self.key)
    }

    fn description(&self) -> String {
        format!("Set {}.{} = {}", self.domain, self.key, self.value)
    }
}

/// Preferences have no bulk query: each key is read on its own.
pub struct PreferenceProvider<'a> {
    system: &'a dyn System,
    sudo: Option<&'a dyn SudoProvider>,
}

impl<'a> PreferenceProvider<'a> {
    pub fn new(system: &'a dyn System, sudo: Option<&'a dyn SudoProvider>) -> Self {
        Self { system, sudo }
    }
}

impl Provider for PreferenceProvider<'_> {
    type Item = Preference;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Preference
    }

    fn installed(&self, desired: &[Preference]) -> Result<BTreeSet<String>> {
        let mut present = BTreeSet::new();
        for pref in desired {
            match self.system.read_default(&pref.domain, &pref.key) {
                Ok(Some(raw)) if pref.value.parse_like(&raw).as_ref() == Some(&pref.value) => {
                    present.insert(pref.id());
                }
                Ok(_) => {}
                // Unreadable counts as missing; the write reports the real error
                Err(e) => log::debug!("{}: {e:#}", pref.id()),
            }
        }
        Ok(present)
    }

    fn acquire(&self, pref: &Preference) -> Result<Acquired> {
        let sudo = if pref.requires_sudo {
            Some(
                self.sudo
                    .context("requires sudo but privilege is not held")?,
            )
        } else {
            None
        };
        self.system
            .write_default(&pref.domain, &pref.key, &pref.value, sudo)?;
        Ok(Acquired::Installed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use declarative::{NoProgress, ReconcileOptions, reconcile};
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// In-memory host
    #[derive(Default)]
    pub(crate) struct FakeSystem {
        pub brew: RefCell<bool>,
        pub brew_installs: RefCell<usize>,
        pub shell: RefCell<String>,
        pub shells: RefCell<Vec<String>>,
        pub defaults: RefCell<BTreeMap<(String, String), String>>,
        pub read_only: Vec<String>,
    }

    impl System for FakeSystem {
        fn brew_installed(&self) -> bool {
            *self.brew.borrow()
        }

        fn install_homebrew(&self, _noninteractive: bool) -> Result<()> {
            *self.brew_installs.borrow_mut() += 1;
            *self.brew.borrow_mut() = true;
            Ok(())
        }

        fn login_shell(&self) -> Result<String> {
            Ok(self.shell.borrow().clone())
        }

        fn registered_shells(&self) -> Result<Vec<String>> {
            Ok(self.shells.borrow().clone())
        }

        fn register_shell(&self, shell: &str, _sudo: &dyn SudoProvider) -> Result<()> {
            self.shells.borrow_mut().push(shell.to_string());
            Ok(())
        }

        fn set_login_shell(&self, shell: &str, _sudo: &dyn SudoProvider) -> Result<()> {
            *self.shell.borrow_mut() = shell.to_string();
            Ok(())
        }

        fn read_default(&self, domain: &str, key: &str) -> Result<Option<String>> {
            Ok(self
                .defaults
                .borrow()
                .get(&(domain.to_string(), key.to_string()))
                .cloned())
        }

        fn write_default(
            &self,
            domain: &str,
            key: &str,
            value: &PreferenceValue,
            _sudo: Option<&dyn SudoProvider>,
        ) -> Result<()> {
            if self.read_only.iter().any(|d| d == domain) {
                bail!("Could not write domain {domain}");
            }
            self.defaults
                .borrow_mut()
                .insert((domain.to_string(), key.to_string()), value.to_arg());
            Ok(())
        }
    }

    #[test]
    fn test_parse_user_shell() {
        assert_eq!(
            parse_user_shell("UserShell: /opt/homebrew/bin/fish\n").as_deref(),
            Some("/opt/homebrew/bin/fish")
        );
        assert_eq!(parse_user_shell("No such key: UserShell"), None);
    }

    #[test]
    fn test_parse_shells() {
        let content = "# List of acceptable shells\n\n/bin/bash\n/bin/zsh\n";
        assert_eq!(parse_shells(content), vec!["/bin/bash", "/bin/zsh"]);
    }

    #[test]
    fn test_preference_from_domain_key() {
        let pref =
            Preference::from_domain_key("com.apple.dock.autohide", PreferenceValue::Bool(true))
                .unwrap();
        assert_eq!(pref.domain, "com.apple.dock");
        assert_eq!(pref.key, "autohide");
        assert_eq!(pref.id(), "com.apple.dock.autohide");
    }

    #[test]
    fn test_preferences_reconcile_by_value() {
        let system = FakeSystem::default();
        system.defaults.borrow_mut().insert(
            ("com.apple.dock".into(), "autohide".into()),
            "1".into(),
        );
        system.defaults.borrow_mut().insert(
            ("NSGlobalDomain".into(), "KeyRepeat".into()),
            "6".into(),
        );

        let desired = vec![
            Preference::new("com.apple.dock", "autohide", PreferenceValue::Bool(true)),
            Preference::new("NSGlobalDomain", "KeyRepeat", PreferenceValue::Int(2)),
        ];
        let provider = PreferenceProvider::new(&system, None);
        let summary =
            reconcile(&provider, &desired, ReconcileOptions::default(), &mut NoProgress).unwrap();

        assert_eq!((summary.present, summary.installed), (1, 1));
        assert_eq!(
            system.read_default("NSGlobalDomain", "KeyRepeat").unwrap().as_deref(),
            Some("2")
        );

        let again =
            reconcile(&provider, &desired, ReconcileOptions::default(), &mut NoProgress).unwrap();
        assert_eq!(again.present, 2);
    }

    #[test]
    fn test_preference_write_failure_is_recorded() {
        let system = FakeSystem {
            read_only: vec!["com.apple.locked".into()],
            ..Default::default()
        };
        let desired = vec![
            Preference::new("com.apple.locked", "A", PreferenceValue::Int(1)),
            Preference::new("com.apple.finder", "ShowPathbar", PreferenceValue::Bool(true)),
        ];
        let provider = PreferenceProvider::new(&system, None);
        let summary =
            reconcile(&provider, &desired, ReconcileOptions::default(), &mut NoProgress).unwrap();

        assert_eq!(summary.installed, 1);
        assert_eq!(summary.failures[0].subject, "preference:com.apple.locked.A");
    }

    #[test]
    fn test_sudo_preference_without_privilege_fails() {
        let system = FakeSystem::default();
        let desired = vec![
            Preference::new("com.apple.loginwindow", "GuestEnabled", PreferenceValue::Bool(false))
                .with_sudo(true),
        ];
        let provider = PreferenceProvider::new(&system, None);
        let summary =
            reconcile(&provider, &desired, ReconcileOptions::default(), &mut NoProgress).unwrap();

        assert_eq!(summary.failed, 1);
        assert!(summary.failures[0].message.contains("sudo"));
    }
}
