//! Reconciliation adapter: packages as declarative resources.

use crate::Client;
use crate::types::{Package, PackageType};
use declarative::{Acquired, Provider, Resource, ResourceKind};
use std::collections::BTreeSet;

impl Resource for Package {
    fn id(&self) -> String {
        self.key().to_string()
    }

    fn description(&self) -> String {
        match &self.store_id {
            Some(id) => format!("Install {} {} ({id})", self.package_type, self.name),
            None => format!("Install {} {}", self.package_type, self.name),
        }
    }
}

/// Map a package type to the resource kind it reconciles as.
pub fn resource_kind(package_type: PackageType) -> ResourceKind {
    match package_type {
        PackageType::Tap => ResourceKind::Tap,
        PackageType::Brew => ResourceKind::Formula,
        PackageType::Cask => ResourceKind::Cask,
        PackageType::Mas => ResourceKind::StoreApp,
    }
}

/// Provider for one package type, backed by a [`Client`].
pub struct PackageProvider<'a> {
    client: &'a Client,
    package_type: PackageType,
}

impl<'a> PackageProvider<'a> {
    pub fn new(client: &'a Client, package_type: PackageType) -> Self {
        Self {
            client,
            package_type,
        }
    }
}

impl Provider for PackageProvider<'_> {
    type Item = Package;

    fn kind(&self) -> ResourceKind {
        resource_kind(self.package_type)
    }

    fn installed(&self, _desired: &[Package]) -> anyhow::Result<BTreeSet<String>> {
        Ok(self.client.list_installed(self.package_type)?)
    }

    fn acquire(&self, item: &Package) -> anyhow::Result<Acquired> {
        if item.package_type != self.package_type {
            anyhow::bail!(
                "{} is a {}, not a {}",
                item.name,
                item.package_type,
                self.package_type
            );
        }
        self.client.install(item)?;
        Ok(Acquired::Installed)
    }
}
