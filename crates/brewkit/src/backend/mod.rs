//! Backend abstraction for package operations.
//!
//! The [`Backend`] trait is the narrow package-manager interface the
//! provisioning pipeline talks to: one bulk "what is installed" query per
//! package type and one install call per package.

pub mod brew;

use crate::error::Result;
use crate::types::{Package, PackageType};
use std::collections::BTreeSet;

/// Backend trait for package operations.
///
/// Implemented by the real `brew`/`mas` CLI backend and by in-memory fakes
/// in tests.
pub trait Backend: Send + Sync {
    /// Check if the package manager is available.
    fn is_available(&self) -> bool;

    /// Install a package.
    fn install(&self, package: &Package) -> Result<()>;

    /// Keys of every installed package of a given type.
    ///
    /// Names for taps, formulas and casks; numeric store ids for mas apps.
    fn list_installed(&self, package_type: PackageType) -> Result<BTreeSet<String>>;
}
