//! Version derivation.
//!
//! A product's full version is its base version, inferred from its own source
//! tree, plus a suffix that identifies the exact set of dependency versions it
//! was built against:
//!
//! ```text
//! <base>               no dependencies, or registry suffix 0
//! <base>+<suffix>      otherwise
//! ```
//!
//! Two interchangeable [`VersionStrategy`] implementations compute the suffix:
//!
//! - [`HashStrategy`] - an abbreviated digest of the dependency set. Stateless.
//! - [`RegistryStrategy`] - a small integer allocated per distinct dependency
//!   set and persisted in a [`VersionDb`](crate::versiondb::VersionDb), so
//!   rebuilding the same inputs reproduces identical versions indefinitely.
//!
//! The strategy also owns the end of a run: [`VersionStrategy::commit`] assigns
//! the manifest its build identifier and publishes whatever state the strategy
//! keeps.

pub mod base;
mod hash;
mod registry;

pub use base::{BaseVersionProvider, CommandVersionProvider, GitDescribeVersion};
pub use hash::HashStrategy;
pub use registry::RegistryStrategy;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::core::Product;
use crate::manifest::Manifest;
use crate::utils;

/// Suffix computation and end-of-run publication.
pub trait VersionStrategy {
    /// Suffix for `product` at `base_version` built against `dependencies`.
    /// `None` means the version carries no suffix.
    fn suffix(
        &mut self,
        product: &str,
        base_version: &str,
        dependencies: &[Arc<Product>],
    ) -> Result<Option<String>>;

    /// Assign `manifest` a build identifier (`build_id` if given) and persist
    /// the strategy's state. Returns the identifier.
    fn commit(&mut self, manifest: &mut Manifest, build_id: Option<&str>) -> Result<String>;
}

/// `name\tversion` records sorted by name, newline-joined.
pub fn dependency_listing(dependencies: &[Arc<Product>]) -> String {
    let mut sorted: Vec<&Arc<Product>> = dependencies.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted.iter().map(|d| format!("{}\t{}", d.name, d.version)).collect::<Vec<_>>().join("\n")
}

/// Full hex SHA-1 of [`dependency_listing`].
pub fn dependency_digest(dependencies: &[Arc<Product>]) -> String {
    utils::sha1_hex(dependency_listing(dependencies))
}

/// Combines base-version inference with a suffix strategy.
pub struct VersionResolver {
    base: Box<dyn BaseVersionProvider>,
    strategy: Box<dyn VersionStrategy>,
}

impl VersionResolver {
    pub fn new(base: Box<dyn BaseVersionProvider>, strategy: Box<dyn VersionStrategy>) -> Self {
        Self { base, strategy }
    }

    /// Full version of `product` checked out at `git_ref` in `source_dir`.
    pub fn version(
        &mut self,
        product: &str,
        source_dir: &Path,
        git_ref: &str,
        dependencies: &[Arc<Product>],
    ) -> Result<String> {
        let base = self.base.base_version(source_dir, git_ref)?;
        if dependencies.is_empty() {
            return Ok(base);
        }
        let version = match self.strategy.suffix(product, &base, dependencies)? {
            Some(suffix) => format!("{base}+{suffix}"),
            None => base,
        };
        tracing::debug!("{product}: {version}");
        Ok(version)
    }

    /// Delegate to the strategy's [`VersionStrategy::commit`].
    pub fn commit(&mut self, manifest: &mut Manifest, build_id: Option<&str>) -> Result<String> {
        self.strategy.commit(manifest, build_id)
    }
}
