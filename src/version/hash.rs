//! Stateless digest-based suffixes.

use anyhow::Result;
use std::sync::Arc;

use super::{VersionStrategy, dependency_digest};
use crate::core::Product;
use crate::manifest::Manifest;
use crate::tags::{TagRegistry, next_build_id};

/// Suffix = the first `abbrev` hex characters of the dependency-set digest.
///
/// Truncation makes collisions possible; they are not detected. Build
/// identifiers come from the tag registry, which is the only state touched.
pub struct HashStrategy {
    abbrev: usize,
    tags: Box<dyn TagRegistry>,
}

impl HashStrategy {
    pub fn new(abbrev: usize, tags: Box<dyn TagRegistry>) -> Self {
        Self { abbrev, tags }
    }
}

impl VersionStrategy for HashStrategy {
    fn suffix(
        &mut self,
        _product: &str,
        _base_version: &str,
        dependencies: &[Arc<Product>],
    ) -> Result<Option<String>> {
        let digest = dependency_digest(dependencies);
        let len = self.abbrev.min(digest.len());
        Ok(Some(digest[..len].to_string()))
    }

    fn commit(&mut self, manifest: &mut Manifest, build_id: Option<&str>) -> Result<String> {
        let id = match build_id {
            Some(id) => id.to_string(),
            None => next_build_id(self.tags.list_build_ids()?)?,
        };
        self.tags.register(&id)?;
        manifest.set_build_id(id.clone());
        tracing::info!("Assigned build identifier {id}");
        Ok(id)
    }
}
