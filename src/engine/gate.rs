//! Account gates: out-of-band sign-ins a run cannot perform itself.
//!
//! A probe must positively confirm authentication. Anything else (a
//! missing tool, a non-zero exit, output we do not recognize) is "unmet".

use crate::runner;
use anyhow::{Result, bail};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\s@]+@[^\s@]+\.[^\s@]+").expect("Invalid regex pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Account {
    AppStore,
    GitHub,
    OnePassword,
}

impl Account {
    pub const ALL: [Self; 3] = [Self::AppStore, Self::GitHub, Self::OnePassword];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AppStore => "app-store",
            Self::GitHub => "github",
            Self::OnePassword => "1password",
        }
    }

    /// What the operator has to do before re-running
    pub fn hint(&self) -> &'static str {
        match self {
            Self::AppStore => "Open the App Store and sign in with your Apple ID",
            Self::GitHub => "Run `gh auth login`",
            Self::OnePassword => {
                "Open 1Password, enable Settings > Developer > CLI integration, then run `op signin`"
            }
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Account {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "app-store" | "appstore" | "mas" => Ok(Self::AppStore),
            "github" | "gh" => Ok(Self::GitHub),
            "1password" | "op" => Ok(Self::OnePassword),
            other => bail!("unknown account: {other}"),
        }
    }
}

/// Answers "is this account signed in on this machine?"
pub trait AccountProbe {
    /// `Ok(true)` only when authentication is positively confirmed
    fn probe(&self, account: Account) -> Result<bool>;
}

/// [`AccountProbe`] that asks each account's own CLI
pub struct CliProbe;

impl AccountProbe for CliProbe {
    fn probe(&self, account: Account) -> Result<bool> {
        let (cmd, args): (&str, &[&str]) = match account {
            Account::AppStore => ("mas", &["account"]),
            Account::GitHub => ("gh", &["auth", "status"]),
            Account::OnePassword => ("op", &["account", "list"]),
        };

        if !runner::command_exists(cmd) {
            bail!("{cmd} not found on PATH");
        }

        let output = runner::run_output(cmd, args)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(output.status.success() && recognizes_sign_in(account, &stdout, &stderr))
    }
}

/// Whether probe output shows a signed-in account
fn recognizes_sign_in(account: Account, stdout: &str, stderr: &str) -> bool {
    match account {
        // `mas account` prints the Apple ID
        Account::AppStore => EMAIL_PATTERN.is_match(stdout.trim()),
        // gh reports on stderr in older releases, stdout in newer ones
        Account::GitHub => stdout.contains("Logged in to") || stderr.contains("Logged in to"),
        // One row per account, each with the account's email
        Account::OnePassword => stdout.lines().skip(1).any(|l| EMAIL_PATTERN.is_match(l)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmetGate {
    pub account: Account,
    pub reason: String,
}

impl fmt::Display for UnmetGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.account, self.reason, self.account.hint())
    }
}

#[derive(Debug, Default)]
pub struct GateReport {
    pub checked: Vec<Account>,
    pub unmet: Vec<UnmetGate>,
}

impl GateReport {
    pub fn is_met(&self) -> bool {
        self.unmet.is_empty()
    }
}

/// Probe every account, treating errors as unmet
pub fn check_account_gates(probe: &dyn AccountProbe, accounts: &[Account]) -> GateReport {
    let mut report = GateReport::default();

    for &account in accounts {
        if report.checked.contains(&account) {
            continue;
        }
        report.checked.push(account);

        let reason = match probe.probe(account) {
            Ok(true) => {
                log::debug!("{account}: signed in");
                continue;
            }
            Ok(false) => "not signed in".to_string(),
            Err(e) => format!("could not check: {e:#}"),
        };
        log::info!("{account}: {reason}");
        report.unmet.push(UnmetGate { account, reason });
    }

    report
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Probe answering from a table; accounts not in it error
    #[derive(Default)]
    pub(crate) struct TableProbe {
        pub answers: HashMap<Account, bool>,
    }

    impl TableProbe {
        pub(crate) fn signed_in(accounts: &[Account]) -> Self {
            Self {
                answers: accounts.iter().map(|a| (*a, true)).collect(),
            }
        }
    }

    impl AccountProbe for TableProbe {
        fn probe(&self, account: Account) -> Result<bool> {
            match self.answers.get(&account) {
                Some(answer) => Ok(*answer),
                None => bail!("probe timed out"),
            }
        }
    }

    #[test]
    fn test_all_met() {
        let probe = TableProbe::signed_in(&[Account::GitHub, Account::AppStore]);
        let report = check_account_gates(&probe, &[Account::GitHub, Account::AppStore]);
        assert!(report.is_met());
        assert_eq!(report.checked.len(), 2);
    }

    #[test]
    fn test_inconclusive_probe_is_unmet() {
        let probe = TableProbe::signed_in(&[Account::GitHub]);
        let report = check_account_gates(&probe, &[Account::GitHub, Account::OnePassword]);

        assert!(!report.is_met());
        assert_eq!(report.unmet.len(), 1);
        assert_eq!(report.unmet[0].account, Account::OnePassword);
        assert!(report.unmet[0].reason.contains("could not check"));
    }

    #[test]
    fn test_explicit_no_is_unmet() {
        let mut probe = TableProbe::default();
        probe.answers.insert(Account::AppStore, false);
        let report = check_account_gates(&probe, &[Account::AppStore]);
        assert_eq!(report.unmet[0].reason, "not signed in");
    }

    #[test]
    fn test_duplicates_probed_once() {
        let probe = TableProbe::signed_in(&[Account::GitHub]);
        let report = check_account_gates(&probe, &[Account::GitHub, Account::GitHub]);
        assert_eq!(report.checked, vec![Account::GitHub]);
    }

    #[test]
    fn test_recognizes_sign_in() {
        assert!(recognizes_sign_in(Account::AppStore, "me@icloud.com\n", ""));
        assert!(!recognizes_sign_in(
            Account::AppStore,
            "Not signed in\n",
            ""
        ));
        assert!(recognizes_sign_in(
            Account::GitHub,
            "",
            "github.com\n  ✓ Logged in to github.com account octocat (keyring)\n"
        ));
        assert!(!recognizes_sign_in(Account::GitHub, "", "You are not logged into any GitHub hosts"));

        let op = "URL                  EMAIL             USER ID\nmy.1password.com     me@example.com    ABCDEF\n";
        assert!(recognizes_sign_in(Account::OnePassword, op, ""));
        assert!(!recognizes_sign_in(Account::OnePassword, "URL  EMAIL  USER ID\n", ""));
    }

    #[test]
    fn test_parse_account() {
        assert_eq!("github".parse::<Account>().unwrap(), Account::GitHub);
        assert_eq!("1Password".parse::<Account>().unwrap(), Account::OnePassword);
        assert_eq!("mas".parse::<Account>().unwrap(), Account::AppStore);
        assert!("gitlab".parse::<Account>().is_err());
    }
}
