//! Persistent, append-only version registry.
//!
//! The registry is a git repository holding a handful of whitespace-separated
//! text tables:
//!
//! ```text
//! ver_db/<product>.txt              <baseVersion> <digest> <suffix>
//! dep_db/<product>.txt              <baseVersion> <suffix> <depName> <depVersion>
//! manifests/content_sha.db.txt      <manifestDigest> <buildId>
//! manifests/<buildId>.txt           archived manifest
//! ```
//!
//! Tables are only ever appended to. A product's rows are loaded on first use
//! and new rows are buffered until [`VersionDb::flush`], so a run that aborts
//! early leaves the store untouched. Publishing a build commits the store and
//! marks it with an annotated `<buildId>` tag.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::BuildError;
use crate::git::GitRepo;
use crate::manifest::Manifest;
use crate::tags::is_build_id;
use crate::utils;

const VERSION_TABLE_DIR: &str = "ver_db";
const DEPENDENCY_TABLE_DIR: &str = "dep_db";
const MANIFEST_DIR: &str = "manifests";
const BUILD_INDEX_FILE: &str = "content_sha.db.txt";

const VERSION_TABLE_HEADER: &str = "# baseVersion dependencySha1 suffix";
const DEPENDENCY_TABLE_HEADER: &str = "# baseVersion suffix dependency dependencyVersion";
const BUILD_INDEX_HEADER: &str = "# manifestSha1 buildId";

/// In-memory state of one product's tables.
#[derive(Debug, Default)]
struct ProductRegistry {
    /// (base version, digest) -> suffix
    suffixes: HashMap<(String, String), u32>,
    /// Highest suffix allocated per base version.
    highest: HashMap<String, u32>,
    pending_versions: Vec<String>,
    pending_dependencies: Vec<String>,
}

impl ProductRegistry {
    fn is_dirty(&self) -> bool {
        !self.pending_versions.is_empty() || !self.pending_dependencies.is_empty()
    }

    fn insert(&mut self, base: &str, digest: &str, suffix: u32) {
        self.suffixes.insert((base.to_string(), digest.to_string()), suffix);
        let highest = self.highest.entry(base.to_string()).or_insert(suffix);
        *highest = (*highest).max(suffix);
    }
}

/// Handle on a registry repository.
pub struct VersionDb {
    root: PathBuf,
    repo: GitRepo,
    products: HashMap<String, ProductRegistry>,
    build_index: Option<IndexMap<String, String>>,
}

impl VersionDb {
    /// Open the registry at `root`, which must already be a git repository.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() || !GitRepo::is_repository(&root) {
            return Err(BuildError::configuration(format!(
                "version registry '{}' is not a git repository",
                root.display()
            ))
            .into());
        }
        tracing::debug!("Opened version registry {}", root.display());
        Ok(Self {
            repo: GitRepo::new(&root),
            root,
            products: HashMap::new(),
            build_index: None,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_table(&self, product: &str) -> PathBuf {
        self.root.join(VERSION_TABLE_DIR).join(format!("{product}.txt"))
    }

    fn dependency_table(&self, product: &str) -> PathBuf {
        self.root.join(DEPENDENCY_TABLE_DIR).join(format!("{product}.txt"))
    }

    fn build_index_path(&self) -> PathBuf {
        self.root.join(MANIFEST_DIR).join(BUILD_INDEX_FILE)
    }

    /// Path of the archived manifest for `build_id`.
    pub fn manifest_path(&self, build_id: &str) -> PathBuf {
        self.root.join(MANIFEST_DIR).join(format!("{build_id}.txt"))
    }

    fn registry(&mut self, product: &str) -> Result<&mut ProductRegistry> {
        if !self.products.contains_key(product) {
            validate_file_stem(product)?;
            let registry = load_version_table(&self.version_table(product))?;
            self.products.insert(product.to_string(), registry);
        }
        self.products
            .get_mut(product)
            .ok_or_else(|| anyhow::anyhow!("registry for {product} not loaded"))
    }

    /// Suffix for `product` at `base_version` built against the dependency set
    /// with digest `digest`, allocating the next free suffix if the pair is new.
    ///
    /// `dependencies` are the `(name, version)` rows recorded alongside a new
    /// allocation.
    pub fn suffix(
        &mut self,
        product: &str,
        base_version: &str,
        digest: &str,
        dependencies: &[(String, String)],
    ) -> Result<u32> {
        let registry = self.registry(product)?;
        let key = (base_version.to_string(), digest.to_string());
        if let Some(&suffix) = registry.suffixes.get(&key) {
            return Ok(suffix);
        }

        let suffix = registry.highest.get(base_version).map_or(0, |h| h + 1);
        registry.insert(base_version, digest, suffix);
        registry.pending_versions.push(format!("{base_version} {digest} {suffix}"));
        for (name, version) in dependencies {
            registry
                .pending_dependencies
                .push(format!("{base_version} {suffix} {name} {version}"));
        }
        tracing::debug!("{product} {base_version}: new dependency set {digest} -> suffix {suffix}");
        Ok(suffix)
    }

    /// Whether any product has rows not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.products.values().any(ProductRegistry::is_dirty)
    }

    /// Append every pending row to its table.
    pub fn flush(&mut self) -> Result<()> {
        let mut names: Vec<String> =
            self.products.iter().filter(|(_, r)| r.is_dirty()).map(|(n, _)| n.clone()).collect();
        names.sort();
        for name in names {
            let version_table = self.version_table(&name);
            let dependency_table = self.dependency_table(&name);
            let Some(registry) = self.products.get_mut(&name) else {
                continue;
            };
            if !registry.pending_versions.is_empty() {
                utils::append_lines(&version_table, VERSION_TABLE_HEADER, &registry.pending_versions)?;
                registry.pending_versions.clear();
            }
            if !registry.pending_dependencies.is_empty() {
                utils::append_lines(
                    &dependency_table,
                    DEPENDENCY_TABLE_HEADER,
                    &registry.pending_dependencies,
                )?;
                registry.pending_dependencies.clear();
            }
            tracing::debug!("Flushed registry rows for {name}");
        }
        Ok(())
    }

    fn build_index(&mut self) -> Result<&mut IndexMap<String, String>> {
        if self.build_index.is_none() {
            self.build_index = Some(load_build_index(&self.build_index_path())?);
        }
        self.build_index
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("build index not loaded"))
    }

    /// Build identifier previously published for a manifest with `digest`.
    pub fn build_id_for(&mut self, digest: &str) -> Result<Option<String>> {
        Ok(self.build_index()?.get(digest).cloned())
    }

    /// Record that `digest` was published as `build_id`, unless the index
    /// already says so.
    pub fn record_build_id(&mut self, digest: &str, build_id: &str) -> Result<()> {
        if self.build_index()?.get(digest).is_some_and(|b| b == build_id) {
            return Ok(());
        }
        let path = self.build_index_path();
        utils::append_lines(&path, BUILD_INDEX_HEADER, &[format!("{digest} {build_id}")])?;
        self.build_index()?.insert(digest.to_string(), build_id.to_string());
        Ok(())
    }

    /// Every `b<n>` identifier known to the store, from the index and from tags.
    pub fn existing_build_ids(&mut self) -> Result<Vec<String>> {
        let mut ids: Vec<String> =
            self.build_index()?.values().filter(|id| is_build_id(id)).cloned().collect();
        ids.extend(self.repo.list_tags()?.into_iter().filter(|t| is_build_id(t)));
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Write `manifest` to `manifests/<build_id>.txt`.
    pub fn archive_manifest(&self, build_id: &str, manifest: &Manifest) -> Result<()> {
        validate_file_stem(build_id)?;
        manifest.to_file(&self.manifest_path(build_id))
    }

    /// Whether `build_id` is already published for a manifest with `digest`.
    ///
    /// A free identifier yields `false`. A tagged one is accepted only when it
    /// was published for the same content and the store holds no uncommitted
    /// or pending changes; otherwise this is a consistency error. Nothing is
    /// written either way.
    pub fn check_published(&mut self, build_id: &str, digest: &str) -> Result<bool> {
        validate_file_stem(build_id)?;
        if !self.repo.tag_exists(build_id)? {
            return Ok(false);
        }
        if self.is_dirty() || self.repo.is_dirty()? {
            return Err(BuildError::consistency(format!(
                "build {build_id} is already published but the version registry at '{}' has uncommitted changes",
                self.root.display()
            ))
            .into());
        }

        let indexed = self.build_id_for(digest)?.is_some_and(|id| id == build_id);
        let archived = self.manifest_path(build_id);
        let same_content = indexed
            || (archived.is_file() && Manifest::from_file(&archived)?.content_hash() == digest);
        if !same_content {
            return Err(BuildError::consistency(format!(
                "build {build_id} is already published with different content"
            ))
            .into());
        }
        Ok(true)
    }

    /// Commit the store and tag it `build_id`.
    ///
    /// When `build_id` is already tagged the store must have nothing to commit:
    /// an identical rebuild changes nothing, while pending changes mean another
    /// run is reusing the identifier.
    pub fn publish(&self, build_id: &str) -> Result<()> {
        let dirty = self.repo.is_dirty()?;
        if self.repo.tag_exists(build_id)? {
            if dirty {
                return Err(BuildError::consistency(format!(
                    "build {build_id} is already published but the version registry at '{}' has uncommitted changes",
                    self.root.display()
                ))
                .into());
            }
            tracing::info!("Build {build_id} already published");
            return Ok(());
        }

        if dirty {
            self.repo.add_all()?;
            self.repo
                .commit(&format!("Updates for build {build_id}."))
                .with_context(|| format!("Failed to commit registry updates for {build_id}"))?;
        }
        self.repo.tag_annotated(build_id, &format!("Build {build_id}"))?;
        tracing::info!("Published build {build_id}");
        Ok(())
    }
}

fn validate_file_stem(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) || name.contains(char::is_whitespace) {
        return Err(BuildError::configuration(format!(
            "'{name}' cannot be used as a registry table name"
        ))
        .into());
    }
    Ok(())
}

fn corrupt(path: &Path, line: usize, message: &str) -> anyhow::Error {
    BuildError::consistency(format!("{}:{line}: {message}", path.display())).into()
}

/// Data rows of a table as token vectors with their line numbers.
fn read_rows(path: &Path) -> Result<Vec<(usize, Vec<String>)>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
        .map(|(n, l)| (n, l.split_whitespace().map(String::from).collect()))
        .collect())
}

fn load_version_table(path: &Path) -> Result<ProductRegistry> {
    let mut registry = ProductRegistry::default();
    for (line, row) in read_rows(path)? {
        let [base, digest, suffix] = row.as_slice() else {
            return Err(corrupt(path, line, "expected <baseVersion> <digest> <suffix>"));
        };
        let suffix: u32 = suffix
            .parse()
            .map_err(|_| corrupt(path, line, &format!("invalid suffix '{suffix}'")))?;
        let key = (base.clone(), digest.clone());
        if let Some(&existing) = registry.suffixes.get(&key)
            && existing != suffix
        {
            return Err(corrupt(
                path,
                line,
                &format!("{base} {digest} maps to both {existing} and {suffix}"),
            ));
        }
        registry.insert(base, digest, suffix);
    }
    Ok(registry)
}

fn load_build_index(path: &Path) -> Result<IndexMap<String, String>> {
    let mut index = IndexMap::new();
    for (line, row) in read_rows(path)? {
        let [digest, build_id] = row.as_slice() else {
            return Err(corrupt(path, line, "expected <manifestDigest> <buildId>"));
        };
        // Later rows win: the newest publication of a digest is authoritative.
        index.insert(digest.clone(), build_id.clone());
    }
    Ok(index)
}
