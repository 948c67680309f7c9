//! Core types for Homebrew package management.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Type of Homebrew package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    /// Homebrew tap (third-party repository)
    Tap,
    /// Homebrew formula (CLI tool)
    Brew,
    /// Homebrew cask (GUI application)
    Cask,
    /// Mac App Store app (via mas)
    Mas,
}

impl PackageType {
    /// Short name used in logs and resource descriptions.
    pub fn directive(&self) -> &'static str {
        match self {
            PackageType::Tap => "tap",
            PackageType::Brew => "brew",
            PackageType::Cask => "cask",
            PackageType::Mas => "mas",
        }
    }
}

impl std::fmt::Display for PackageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.directive())
    }
}

/// A package to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package name (e.g., "git", "homebrew/cask-fonts", "Xcode")
    pub name: String,
    /// Type of package
    pub package_type: PackageType,
    /// App Store id, for mas packages
    pub store_id: Option<String>,
}

impl Package {
    /// Create a new package with the given name and type.
    pub fn new(name: impl Into<String>, package_type: PackageType) -> Self {
        Self {
            name: name.into(),
            package_type,
            store_id: None,
        }
    }

    /// Create a tap package.
    pub fn tap(name: impl Into<String>) -> Self {
        Self::new(name, PackageType::Tap)
    }

    /// Create a brew formula package.
    pub fn brew(name: impl Into<String>) -> Self {
        Self::new(name, PackageType::Brew)
    }

    /// Create a cask package.
    pub fn cask(name: impl Into<String>) -> Self {
        Self::new(name, PackageType::Cask)
    }

    /// Create a mas app package.
    pub fn mas(name: impl Into<String>, id: impl Into<String>) -> Self {
        let mut pkg = Self::new(name, PackageType::Mas);
        pkg.store_id = Some(id.into());
        pkg
    }

    /// Identifier as reported by the matching `list_installed` query.
    ///
    /// Store apps are listed by numeric id. Formulas and casks are listed
    /// by short name, so a tap-qualified name (`owner/tap/name`) keys on its
    /// last segment.
    pub fn key(&self) -> &str {
        match (&self.package_type, &self.store_id) {
            (PackageType::Mas, Some(id)) => id.as_str(),
            (PackageType::Brew | PackageType::Cask, _) => {
                self.name.rsplit('/').next().unwrap_or(&self.name)
            }
            _ => &self.name,
        }
    }
}

/// Configuration for retry logic.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_key() {
        assert_eq!(Package::brew("jq").key(), "jq");
        assert_eq!(Package::mas("Xcode", "497799835").key(), "497799835");
        assert_eq!(Package::brew("hashicorp/tap/terraform").key(), "terraform");
        assert_eq!(Package::tap("hashicorp/tap").key(), "hashicorp/tap");
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(30));
    }
}
