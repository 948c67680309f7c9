//! Resource and provider traits
//!
//! A [`Resource`] is a plain value naming something that should exist. A
//! [`Provider`] knows, for one [`ResourceKind`], how to list what already
//! exists and how to acquire what does not.

use crate::types::{Acquired, ResourceKind};
use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt;

/// A declared resource
///
/// # Example
///
/// ```ignore
/// #[derive(Debug)]
/// struct Formula(String);
///
/// impl Resource for Formula {
///     fn id(&self) -> String {
///         self.0.clone()
///     }
/// }
/// ```
pub trait Resource: fmt::Debug {
    /// Identifier, unique within the resource kind
    ///
    /// Examples:
    /// - "ripgrep" for a formula
    /// - "497799835" for a store app
    /// - "peasy" for a repository directory
    fn id(&self) -> String;

    /// Human-readable description
    fn description(&self) -> String {
        self.id()
    }
}

/// Kind-specific existence and acquisition strategy
pub trait Provider {
    /// The resource type this provider reconciles
    type Item: Resource;

    /// Kind of every item handled by this provider
    fn kind(&self) -> ResourceKind;

    /// Ids of the desired items that already exist.
    ///
    /// Called once per reconcile call. Implementations should answer with a
    /// single bulk query where the underlying tool offers one; `desired` is
    /// passed for kinds whose existence can only be checked per item.
    fn installed(&self, desired: &[Self::Item]) -> Result<BTreeSet<String>>;

    /// Acquire a single missing item
    fn acquire(&self, item: &Self::Item) -> Result<Acquired>;
}

impl Resource for String {
    fn id(&self) -> String {
        self.clone()
    }
}
