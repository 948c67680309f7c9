//! # brewkit
//!
//! Pure Rust library for Homebrew and Mac App Store package management.
//!
//! This crate provides:
//! - One bulk "list installed" query per package type (taps, formulas, casks, mas apps)
//! - Installing packages with retry on transient network errors
//! - Classification of `brew`/`mas` failures into actionable categories
//! - A [`provider::PackageProvider`] so packages reconcile as declarative resources
//!
//! ## Example
//!
//! ```no_run
//! use brewkit::{Client, Package, PackageType};
//!
//! let client = Client::new().expect("Homebrew not available");
//!
//! let installed = client.list_installed(PackageType::Brew).expect("list failed");
//! if !installed.contains("git") {
//!     client.install(&Package::brew("git")).expect("install failed");
//! }
//! ```
//!
//! ## Retry Logic
//!
//! Network errors during installation are retried with exponential backoff.
//! Configure it with [`RetryConfig`].
//!
//! ```no_run
//! use brewkit::{Client, RetryConfig};
//! use std::time::Duration;
//!
//! let client = Client::new()
//!     .unwrap()
//!     .with_retry(RetryConfig::new(3, Duration::from_secs(5), 2.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
#[allow(missing_docs)]
pub mod provider;
pub mod retry;
pub mod types;

pub use error::{Error, Result};
pub use provider::PackageProvider;
pub use types::{Package, PackageType, RetryConfig};

use backend::{Backend, brew::BrewBackend};
use std::collections::BTreeSet;

/// High-level client for package operations.
///
/// Wraps a backend and applies the retry policy to installs.
pub struct Client {
    backend: Box<dyn Backend>,
    retry: RetryConfig,
}

impl Client {
    /// Create a new Client with the default backend.
    ///
    /// Returns an error if Homebrew is not installed.
    pub fn new() -> Result<Self> {
        let backend = BrewBackend::new()?;
        Ok(Self::with_backend(Box::new(backend)))
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry policy used by [`Client::install`].
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Check if the package manager is available.
    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    /// Install a package, retrying transient failures.
    pub fn install(&self, package: &Package) -> Result<()> {
        retry::with_retry(&self.retry, Some(&retry::LogCallback), || {
            self.backend.install(package)
        })
    }

    /// Keys of every installed package of a given type.
    pub fn list_installed(&self, package_type: PackageType) -> Result<BTreeSet<String>> {
        self.backend.list_installed(package_type)
    }
}
