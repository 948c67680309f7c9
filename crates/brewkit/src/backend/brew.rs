//! Real Homebrew CLI backend using `brew` and `mas` commands.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Package, PackageType};
use std::collections::BTreeSet;
use std::process::{Command, Output};

/// Backend that executes real `brew` commands.
pub struct BrewBackend {
    /// Path to the brew executable
    brew_path: String,
}

impl BrewBackend {
    /// Create a new BrewBackend.
    ///
    /// Returns an error if Homebrew is not installed.
    pub fn new() -> Result<Self> {
        let brew_path = find_brew()?;
        Ok(Self { brew_path })
    }

    /// Run a brew command and return output.
    fn run_brew(&self, args: &[&str]) -> Result<Output> {
        log::debug!("{} {}", self.brew_path, args.join(" "));
        Command::new(&self.brew_path)
            .args(args)
            .output()
            .map_err(|e| Error::CommandFailed {
                message: format!("failed to execute brew: {e}"),
                stderr: String::new(),
            })
    }

    /// Run a brew command and check for success.
    fn run_brew_checked(&self, args: &[&str], package_name: Option<&str>) -> Result<String> {
        let output = self.run_brew(args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::from_brew_output(&stderr, package_name));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Backend for BrewBackend {
    fn is_available(&self) -> bool {
        self.run_brew(&["--version"])
            .is_ok_and(|o| o.status.success())
    }

    fn install(&self, package: &Package) -> Result<()> {
        let args = match package.package_type {
            PackageType::Tap => vec!["tap", package.name.as_str()],
            PackageType::Brew => vec!["install", "--formula", package.name.as_str()],
            PackageType::Cask => vec!["install", "--cask", package.name.as_str()],
            PackageType::Mas => {
                let id = package
                    .store_id
                    .as_deref()
                    .ok_or_else(|| Error::Other(format!("mas app {} has no id", package.name)))?;
                return run_mas_install(id);
            }
        };

        match self.run_brew_checked(&args, Some(&package.name)) {
            Ok(_) => Ok(()),
            // Listed under another name (tap-qualified, renamed): nothing to do
            Err(e) if e.is_ignorable() => {
                log::debug!("{}: {e}", package.name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn list_installed(&self, package_type: PackageType) -> Result<BTreeSet<String>> {
        let args: &[&str] = match package_type {
            PackageType::Tap => &["tap"],
            PackageType::Brew => &["list", "--formula", "-1"],
            PackageType::Cask => &["list", "--cask", "-1"],
            PackageType::Mas => return list_mas_installed(),
        };

        let stdout = self.run_brew_checked(args, None)?;
        Ok(parse_name_list(&stdout))
    }
}

/// Find the brew executable path.
fn find_brew() -> Result<String> {
    let paths = [
        "/opt/homebrew/bin/brew",              // Apple Silicon
        "/usr/local/bin/brew",                 // Intel
        "/home/linuxbrew/.linuxbrew/bin/brew", // Linux
    ];

    for path in &paths {
        if std::path::Path::new(path).exists() {
            return Ok((*path).to_string());
        }
    }

    let output = Command::new("which")
        .arg("brew")
        .output()
        .map_err(|_| Error::BrewNotFound)?;

    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !path.is_empty() {
            return Ok(path);
        }
    }

    Err(Error::BrewNotFound)
}

/// One name per line, blank lines ignored.
fn parse_name_list(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// mas (Mac App Store) helpers
// =============================================================================

fn run_mas(args: &[&str]) -> Result<Output> {
    Command::new("mas").args(args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ToolMissing {
                tool: "mas".to_string(),
            }
        } else {
            Error::CommandFailed {
                message: format!("failed to execute mas: {e}"),
                stderr: String::new(),
            }
        }
    })
}

fn run_mas_install(app_id: &str) -> Result<()> {
    let output = run_mas(&["install", app_id])?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::from_brew_output(&stderr, Some(app_id)));
    }

    Ok(())
}

fn list_mas_installed() -> Result<BTreeSet<String>> {
    let output = run_mas(&["list"])?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CommandFailed {
            message: "mas list failed".to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(parse_mas_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Extract store ids from `mas list` output.
///
/// Format: `497799835  Xcode  (15.2)`, possibly with leading spaces.
fn parse_mas_list(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}
