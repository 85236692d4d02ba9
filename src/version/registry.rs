//! Registry-backed integer suffixes and the build publication protocol.

use anyhow::Result;
use std::sync::Arc;

use super::{VersionStrategy, dependency_digest};
use crate::core::Product;
use crate::manifest::Manifest;
use crate::tags::{TagRegistry, next_build_id};
use crate::versiondb::VersionDb;

/// Suffixes allocated per distinct dependency set and persisted in a
/// [`VersionDb`].
///
/// The first dependency set seen for a base version gets suffix 0, rendered as
/// no suffix at all.
pub struct RegistryStrategy {
    db: VersionDb,
    tags: Box<dyn TagRegistry>,
}

impl RegistryStrategy {
    pub fn new(db: VersionDb, tags: Box<dyn TagRegistry>) -> Self {
        Self { db, tags }
    }

    fn allocate_build_id(&mut self, digest: &str) -> Result<String> {
        if let Some(id) = self.db.build_id_for(digest)? {
            tracing::info!("Manifest {digest} was already published as {id}");
            return Ok(id);
        }
        let mut existing = self.db.existing_build_ids()?;
        existing.extend(self.tags.list_build_ids()?);
        next_build_id(existing)
    }
}

impl VersionStrategy for RegistryStrategy {
    fn suffix(
        &mut self,
        product: &str,
        base_version: &str,
        dependencies: &[Arc<Product>],
    ) -> Result<Option<String>> {
        let digest = dependency_digest(dependencies);
        let mut rows: Vec<(String, String)> =
            dependencies.iter().map(|d| (d.name.clone(), d.version.clone())).collect();
        rows.sort();
        let suffix = self.db.suffix(product, base_version, &digest, &rows)?;
        Ok((suffix != 0).then(|| suffix.to_string()))
    }

    fn commit(&mut self, manifest: &mut Manifest, build_id: Option<&str>) -> Result<String> {
        let digest = manifest.content_hash();
        let id = match build_id {
            Some(id) => id.to_string(),
            None => self.allocate_build_id(&digest)?,
        };
        // Decided before anything is written, so a refused identifier leaves
        // the store untouched.
        let published = self.db.check_published(&id, &digest)?;
        manifest.set_build_id(id.clone());
        if published {
            tracing::info!("Build {id} already published for this content");
            return Ok(id);
        }

        self.db.flush()?;
        self.db.record_build_id(&digest, &id)?;
        self.db.archive_manifest(&id, manifest)?;
        self.db.publish(&id)?;

        tracing::info!("Committed build {id}");
        Ok(id)
    }
}
