//! Path resolution for groundwork
//!
//! # Environment Variables
//!
//! - `GROUNDWORK_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/groundwork`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `GROUNDWORK_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/groundwork` (if set)
//! 3. `~/.config/groundwork`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "GROUNDWORK_CONFIG_DIR";

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Get the groundwork config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("groundwork");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("groundwork");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Default location of the config file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand ~ and environment variables in a path string.
///
/// Every user-supplied path in the config goes through here.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
