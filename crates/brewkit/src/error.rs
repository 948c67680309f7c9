//! Errors from `brew` and `mas`.
//!
//! A failed command is classified from its stderr so the client knows
//! whether to retry it, ignore it, or report it. Whatever the class, the
//! message keeps enough of the tool's own output to act on by hand.

use thiserror::Error;

/// Errors that can occur during package operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Download or connectivity failure; worth another attempt
    #[error("network error: {message}")]
    Network {
        /// The tool's stderr
        message: String,
    },

    /// No formula, cask, tap or app by that name
    #[error("package not found: {name}")]
    NotFound {
        /// Name that was asked for
        name: String,
    },

    /// The package manager already has it, under this or another name
    #[error("already installed: {name}")]
    AlreadyInstalled {
        /// Name that was asked for
        name: String,
    },

    /// `mas` has no App Store account to install with
    #[error("not signed in to the App Store; open App Store.app and sign in")]
    SignedOut,

    /// Filesystem or sudo permission problem
    #[error("permission denied: {message}")]
    Permission {
        /// The tool's stderr
        message: String,
    },

    /// Homebrew is not installed or not found in PATH
    #[error("Homebrew not found. Install it from https://brew.sh")]
    BrewNotFound,

    /// A helper tool (e.g. `mas`) is not installed
    #[error("{tool} not found on PATH")]
    ToolMissing {
        /// Name of the missing executable
        tool: String,
    },

    /// Any other non-zero exit
    #[error("{message}{}", with_stderr(.stderr))]
    CommandFailed {
        /// What was being run
        message: String,
        /// The tool's stderr, trimmed
        stderr: String,
    },

    /// Invalid request
    #[error("{0}")]
    Other(String),
}

fn with_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl Error {
    /// Transient failures the client retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Failures that mean the install already happened.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::AlreadyInstalled { .. })
    }

    /// Classify a failed `brew`/`mas` invocation from its stderr.
    pub fn from_brew_output(stderr: &str, package_name: Option<&str>) -> Self {
        let stderr = stderr.trim();
        let lower = stderr.to_lowercase();
        let name = || package_name.unwrap_or("unknown").to_string();
        let mentions = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if mentions(&[
            "could not resolve",
            "connection refused",
            "timed out",
            "failed to download",
            "sha256 mismatch",
            "curl: (",
            "ssl",
        ]) {
            return Self::Network {
                message: stderr.to_string(),
            };
        }

        if mentions(&[
            "no available formula",
            "no formulae found",
            "no cask with this name",
            "no such keg",
            "couldn't find",
            "no apps found",
        ]) {
            return Self::NotFound { name: name() };
        }

        if mentions(&["already installed", "is already an installed"]) {
            return Self::AlreadyInstalled { name: name() };
        }

        if mentions(&["not signed in", "sign in to the app store"]) {
            return Self::SignedOut;
        }

        if mentions(&["permission denied", "operation not permitted", "cannot write"]) {
            return Self::Permission {
                message: stderr.to_string(),
            };
        }

        Self::CommandFailed {
            message: match package_name {
                Some(n) => format!("install of {n} failed"),
                None => "command failed".to_string(),
            },
            stderr: stderr.to_string(),
        }
    }
}

/// Result type for package operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_is_retryable() {
        let err = Error::from_brew_output("curl: (6) Could not resolve host", Some("wget"));
        assert!(matches!(err, Error::Network { .. }));
        assert!(err.is_retryable());
        assert!(!err.is_ignorable());
    }

    #[test]
    fn test_not_found() {
        let err = Error::from_brew_output(
            "Error: No available formula with the name \"foo\"",
            Some("foo"),
        );
        assert!(matches!(err, Error::NotFound { ref name } if name == "foo"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_already_installed_is_ignorable() {
        let err = Error::from_brew_output("Warning: git is already installed", Some("git"));
        assert!(err.is_ignorable());
    }

    #[test]
    fn test_permission() {
        let err = Error::from_brew_output("Permission denied @ dir_s_mkdir", Some("foo"));
        assert!(matches!(err, Error::Permission { .. }));
        assert!(err.to_string().contains("dir_s_mkdir"));
    }

    #[test]
    fn test_mas_signed_out() {
        let err = Error::from_brew_output("Error: Not signed in", Some("497799835"));
        assert!(matches!(err, Error::SignedOut));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unclassified_failure_keeps_stderr() {
        let err = Error::from_brew_output(
            "Error: Cannot install gh because a newer macOS is required\n",
            Some("gh"),
        );
        assert_eq!(
            err.to_string(),
            "install of gh failed: Error: Cannot install gh because a newer macOS is required"
        );
    }

    #[test]
    fn test_command_failed_without_stderr() {
        let err = Error::CommandFailed {
            message: "failed to execute brew: No such file".to_string(),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "failed to execute brew: No such file");
    }

    #[test]
    fn test_tool_missing() {
        let err = Error::ToolMissing {
            tool: "mas".to_string(),
        };
        assert_eq!(err.to_string(), "mas not found on PATH");
    }
}
