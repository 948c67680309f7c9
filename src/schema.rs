use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

// ============================================================================
// Main Config Schema
// ============================================================================

/// Everything a provisioning run should make true, loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Privilege keepalive and the sudo allowlist
    #[serde(default)]
    pub privilege: PrivilegeConfig,

    /// Homebrew taps, formulas, and casks
    #[serde(default)]
    pub packages: PackagesConfig,

    /// Mac App Store applications
    #[serde(default)]
    pub store_apps: Vec<StoreApp>,

    /// Login shell
    #[serde(default)]
    pub shell: ShellConfig,

    /// Lines that must be present in existing config files
    #[serde(default)]
    pub config_lines: Vec<ConfigLineEntry>,

    /// macOS defaults (domain.key = value)
    #[serde(default)]
    pub defaults: BTreeMap<String, PreferenceValue>,

    /// Source repositories to clone
    #[serde(default)]
    pub repositories: RepositoriesConfig,
}

impl ProvisionConfig {
    /// Load config from `path`.
    ///
    /// A missing file is not an error: every desired set is empty.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!(
                "No config at {}, nothing is declared beyond the base system",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs that would make reconciliation ambiguous
    pub fn validate(&self) -> Result<()> {
        let secs = self.privilege.keepalive_secs;
        if secs == 0 || secs >= MAX_KEEPALIVE_SECS {
            bail!(
                "privilege.keepalive_secs must be between 1 and {} (got {secs})",
                MAX_KEEPALIVE_SECS - 1
            );
        }

        let mut dirs = BTreeSet::new();
        for entry in &self.repositories.entries {
            let dir = entry.dir.trim();
            if dir.is_empty() || dir == "." || dir == ".." || dir.contains('/') {
                bail!("Invalid repository directory name: '{}'", entry.dir);
            }
            if !dirs.insert(entry.dir.as_str()) {
                bail!("Duplicate repository directory: '{}'", entry.dir);
            }
        }

        for key in self.defaults.keys() {
            split_domain_key(key)?;
        }

        for account in &self.repositories.accounts {
            if account.parse::<crate::engine::gate::Account>().is_err() {
                bail!("Unknown account in repositories.accounts: '{account}'");
            }
        }

        for app in &self.store_apps {
            if app.id.is_empty() || !app.id.chars().all(|c| c.is_ascii_digit()) {
                bail!("Store app '{}' has a non-numeric id '{}'", app.name, app.id);
            }
        }

        Ok(())
    }

    /// Total number of declared resources across all kinds
    pub fn declared_count(&self) -> usize {
        self.packages.taps.len()
            + self.packages.formulas.len()
            + self.packages.casks.len()
            + self.store_apps.len()
            + self.config_lines.len()
            + self.defaults.len()
            + self.repositories.entries.len()
            + usize::from(self.shell.login.is_some())
    }
}

// ============================================================================
// Privilege
// ============================================================================

/// The sudo credential cache expires after five minutes
const MAX_KEEPALIVE_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivilegeConfig {
    /// Seconds between non-interactive revalidations
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Preference keys (domain.key) written through sudo
    #[serde(default)]
    pub defaults: Vec<String>,
}

fn default_keepalive_secs() -> u64 {
    60
}

impl Default for PrivilegeConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive_secs(),
            defaults: Vec::new(),
        }
    }
}

impl PrivilegeConfig {
    pub fn default_requires_sudo(&self, domain_key: &str) -> bool {
        self.defaults.iter().any(|d| d == domain_key)
    }
}

// ============================================================================
// Packages
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackagesConfig {
    #[serde(default)]
    pub taps: Vec<String>,
    #[serde(default)]
    pub formulas: Vec<String>,
    #[serde(default)]
    pub casks: Vec<String>,
}

impl PackagesConfig {
    pub fn is_empty(&self) -> bool {
        self.taps.is_empty() && self.formulas.is_empty() && self.casks.is_empty()
    }
}

/// A Mac App Store application, keyed on its numeric store id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreApp {
    pub id: String,
    pub name: String,
}

// ============================================================================
// Shell and config files
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Absolute path of the desired login shell (e.g., /opt/homebrew/bin/fish)
    pub login: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLineEntry {
    /// File to patch; only patched when it already exists
    pub file: String,
    /// Substring whose presence means the line is already there
    #[serde(default)]
    pub marker: String,
    /// Line appended when neither marker nor line is present
    pub line: String,
}

// ============================================================================
// Preferences
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl PreferenceValue {
    /// Type flag for `defaults write`
    pub fn type_flag(&self) -> &'static str {
        match self {
            PreferenceValue::Bool(_) => "-bool",
            PreferenceValue::Int(_) => "-int",
            PreferenceValue::Float(_) => "-float",
            PreferenceValue::String(_) => "-string",
        }
    }

    /// Value as passed to `defaults write`
    pub fn to_arg(&self) -> String {
        match self {
            PreferenceValue::Bool(b) => b.to_string(),
            PreferenceValue::Int(i) => i.to_string(),
            PreferenceValue::Float(f) => f.to_string(),
            PreferenceValue::String(s) => s.clone(),
        }
    }

    /// Interpret `defaults read` output as the same type as `self`
    pub fn parse_like(&self, raw: &str) -> Option<PreferenceValue> {
        let raw = raw.trim();
        match self {
            PreferenceValue::Bool(_) => match raw {
                "1" | "true" | "YES" => Some(PreferenceValue::Bool(true)),
                "0" | "false" | "NO" => Some(PreferenceValue::Bool(false)),
                _ => None,
            },
            PreferenceValue::Int(_) => raw.parse::<i64>().ok().map(PreferenceValue::Int),
            PreferenceValue::Float(_) => raw.parse::<f64>().ok().map(PreferenceValue::Float),
            PreferenceValue::String(_) => Some(PreferenceValue::String(raw.to_string())),
        }
    }
}

impl fmt::Display for PreferenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferenceValue::String(s) => write!(f, "\"{s}\""),
            other => f.write_str(&other.to_arg()),
        }
    }
}

/// Split "domain.key" into (domain, key).
///
/// NSGlobalDomain is matched first; otherwise the last dot separates the
/// domain from the key.
pub fn split_domain_key(domain_key: &str) -> Result<(&str, &str)> {
    if let Some(key) = domain_key.strip_prefix("NSGlobalDomain.")
        && !key.is_empty()
    {
        return Ok(("NSGlobalDomain", key));
    }

    match domain_key.rsplit_once('.') {
        Some((domain, key)) if !domain.is_empty() && !key.is_empty() => Ok((domain, key)),
        _ => bail!("Invalid domain.key format: {domain_key}"),
    }
}

// ============================================================================
// Repositories
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoriesConfig {
    /// Directory that holds every checkout
    #[serde(default = "default_repo_root")]
    pub root: String,

    /// Accounts that must be signed in before cloning
    #[serde(default = "default_repo_accounts")]
    pub accounts: Vec<String>,

    #[serde(default)]
    pub entries: Vec<RepoConfig>,
}

fn default_repo_root() -> String {
    "~/src".to_string()
}

fn default_repo_accounts() -> Vec<String> {
    vec!["github".to_string()]
}

impl Default for RepositoriesConfig {
    fn default() -> Self {
        Self {
            root: default_repo_root(),
            accounts: default_repo_accounts(),
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Local directory name under the root
    pub dir: String,
    /// Clone URL
    pub remote: String,
    #[serde(default)]
    pub branch: Option<String>,
}
