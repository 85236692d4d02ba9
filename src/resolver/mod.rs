//! Dependency graph construction.
//!
//! [`DependencyGraphBuilder::construct`] walks declared dependencies depth-first
//! from a set of root products. Each distinct product name is fetched and
//! versioned exactly once: a product reached through several paths (a diamond)
//! becomes one shared [`Product`] node. Dependencies are completed before their
//! dependents, so every version is computed from already-versioned inputs.
//!
//! Edges are pruned in two cases:
//! - the reserved [`IMPLICIT_PRODUCTS`] name, which stands for whatever the
//!   environment provides
//! - optional dependencies matched by an exclusion rule for the dependent
//!
//! A dependency cycle aborts the walk with [`BuildError::Dependency`] naming the
//! offending path.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{BuildError, IMPLICIT_PRODUCTS, Product};
use crate::declarations::DeclarationsProvider;
use crate::exclusion::ExclusionResolver;
use crate::manifest::Manifest;
use crate::mirror::ProductSource;
use crate::version::VersionResolver;

#[derive(Debug, Clone)]
enum VisitState {
    /// On the current walk path.
    Visiting,
    Done(Arc<Product>),
}

/// Builds manifests by fetching, inspecting, and versioning products.
pub struct DependencyGraphBuilder {
    source: Box<dyn ProductSource>,
    declarations: Box<dyn DeclarationsProvider>,
    exclusions: ExclusionResolver,
    versions: VersionResolver,
    memo: HashMap<String, VisitState>,
    path: Vec<String>,
    discovered: Vec<Arc<Product>>,
}

impl DependencyGraphBuilder {
    pub fn new(
        source: Box<dyn ProductSource>,
        declarations: Box<dyn DeclarationsProvider>,
        exclusions: ExclusionResolver,
        versions: VersionResolver,
    ) -> Self {
        Self {
            source,
            declarations,
            exclusions,
            versions,
            memo: HashMap::new(),
            path: Vec::new(),
            discovered: Vec::new(),
        }
    }

    /// Resolve `roots` and everything they depend on into a sorted manifest.
    pub fn construct<S: AsRef<str>>(&mut self, roots: &[S]) -> Result<Manifest> {
        self.memo.clear();
        self.path.clear();
        self.discovered.clear();

        for root in roots {
            self.resolve(root.as_ref())?;
        }
        tracing::info!(
            "Resolved {} products from {} roots",
            self.discovered.len(),
            roots.len()
        );
        Manifest::from_products(std::mem::take(&mut self.discovered))
    }

    /// Assign `manifest` its build identifier and publish the version state.
    pub fn commit(&mut self, manifest: &mut Manifest, build_id: Option<&str>) -> Result<String> {
        self.versions.commit(manifest, build_id)
    }

    fn resolve(&mut self, name: &str) -> Result<Arc<Product>> {
        match self.memo.get(name) {
            Some(VisitState::Done(product)) => return Ok(Arc::clone(product)),
            Some(VisitState::Visiting) => {
                let start = self.path.iter().position(|p| p == name).unwrap_or(0);
                let mut cycle = self.path[start..].to_vec();
                cycle.push(name.to_string());
                return Err(BuildError::Dependency { cycle }.into());
            }
            None => {}
        }
        self.memo.insert(name.to_string(), VisitState::Visiting);
        self.path.push(name.to_string());

        let fetched = self.source.fetch(name)?;
        let declared = self.declarations.dependencies(name, &fetched.source_dir)?;

        let mut dependencies: Vec<Arc<Product>> = Vec::with_capacity(declared.len());
        for dep in declared {
            if dep.name == IMPLICIT_PRODUCTS {
                continue;
            }
            if dep.optional && self.exclusions.is_excluded(&dep.name, name) {
                tracing::debug!(
                    "{name}: optional dependency {} excluded",
                    dep.name
                );
                continue;
            }
            if dependencies.iter().any(|d| d.name == dep.name) {
                continue;
            }
            dependencies.push(self.resolve(&dep.name)?);
        }

        let version =
            self.versions
                .version(name, &fetched.source_dir, &fetched.git_ref, &dependencies)?;
        let product = Arc::new(Product::new(name, fetched.commit, version, dependencies));

        self.path.pop();
        self.memo.insert(name.to_string(), VisitState::Done(Arc::clone(&product)));
        self.discovered.push(Arc::clone(&product));
        tracing::debug!("{name}: {}", product.version);
        Ok(product)
    }
}
