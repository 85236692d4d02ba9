//! Where each product's source comes from.
//!
//! A product's acceptable origins are the URL declared for it in the repository
//! directory (a YAML file), followed by URLs generated from the configured
//! patterns. Its ref candidates are the refs requested for the run, then the
//! directory's declared ref, then the implicit fallback `master`.
//!
//! # Repository directory format
//!
//! ```yaml
//! afw: https://github.com/example/afw.git
//! testdata_subaru:
//!   url: https://github.com/example/testdata_subaru.git
//!   ref: main
//!   lfs: true
//! ```

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

use crate::core::BuildError;

/// Ref tried after every explicitly requested or declared ref.
pub const DEFAULT_REF: &str = "master";

/// Placeholder replaced with the product name in URL patterns.
pub const PRODUCT_PLACEHOLDER: &str = "%(product)s";

/// Repository facts for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSpec {
    pub url: String,
    /// Preferred ref when none of the requested refs exist
    pub git_ref: String,
    /// Whether the repository keeps content in large-file storage
    pub lfs: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Url(String),
    Detailed(DetailedEntry),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DetailedEntry {
    url: String,
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    #[serde(default)]
    lfs: bool,
}

/// The repository directory: product name to [`RepoSpec`].
#[derive(Debug, Clone, Default)]
pub struct RepositoryDirectory {
    repos: IndexMap<String, RepoSpec>,
}

impl RepositoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a repository directory from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read repository directory {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid repository directory {}", path.display()))
    }

    /// Parse repository-directory YAML. Any malformed entry is a
    /// [`BuildError::Configuration`].
    pub fn parse(content: &str) -> Result<Self> {
        let raw: IndexMap<String, serde_yaml::Value> = match serde_yaml::from_str(content) {
            Ok(Some(map)) => map,
            Ok(None) => IndexMap::new(),
            Err(e) => {
                return Err(BuildError::configuration(format!("unparseable YAML: {e}")).into());
            }
        };

        let mut repos = IndexMap::with_capacity(raw.len());
        for (product, value) in raw {
            let entry: RawEntry = serde_yaml::from_value(value).map_err(|e| {
                BuildError::configuration(format!("malformed entry for '{product}': {e}"))
            })?;
            let spec = match entry {
                RawEntry::Url(url) => RepoSpec {
                    url,
                    git_ref: DEFAULT_REF.to_string(),
                    lfs: false,
                },
                RawEntry::Detailed(d) => RepoSpec {
                    url: d.url,
                    git_ref: d.git_ref.unwrap_or_else(|| DEFAULT_REF.to_string()),
                    lfs: d.lfs,
                },
            };
            if spec.url.trim().is_empty() {
                return Err(BuildError::configuration(format!(
                    "malformed entry for '{product}': empty url"
                ))
                .into());
            }
            repos.insert(product, spec);
        }
        Ok(Self { repos })
    }

    pub fn insert(&mut self, product: impl Into<String>, spec: RepoSpec) {
        self.repos.insert(product.into(), spec);
    }

    pub fn get(&self, product: &str) -> Option<&RepoSpec> {
        self.repos.get(product)
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}

/// Computes origin and ref candidate lists for products.
#[derive(Debug, Clone, Default)]
pub struct SourceResolver {
    directory: RepositoryDirectory,
    patterns: Vec<String>,
    refs: Vec<String>,
}

impl SourceResolver {
    /// `patterns` is a `|`-separated list of URL patterns; `refs` are the refs
    /// requested for the run, most preferred first.
    pub fn new(directory: RepositoryDirectory, patterns: Option<&str>, refs: Vec<String>) -> Self {
        let patterns = patterns
            .map(|p| p.split('|').map(str::trim).filter(|p| !p.is_empty()).map(String::from).collect())
            .unwrap_or_default();
        Self {
            directory,
            patterns,
            refs,
        }
    }

    pub fn repo_spec(&self, product: &str) -> Option<&RepoSpec> {
        self.directory.get(product)
    }

    /// Whether the product's repository is marked as large-file-storage backed.
    pub fn is_lfs(&self, product: &str) -> bool {
        self.directory.get(product).is_some_and(|s| s.lfs)
    }

    /// Acceptable remote URLs for `product`, most preferred first.
    pub fn origin_candidates(&self, product: &str) -> Vec<String> {
        let mut candidates = Vec::new();
        if let Some(spec) = self.directory.get(product) {
            candidates.push(spec.url.clone());
        }
        for pattern in &self.patterns {
            let url = pattern.replace(PRODUCT_PLACEHOLDER, product);
            if !candidates.contains(&url) {
                candidates.push(url);
            }
        }
        candidates
    }

    /// Refs to try for `product`: requested refs, the declared ref, then
    /// [`DEFAULT_REF`], without duplicates.
    pub fn ref_candidates(&self, product: &str) -> Vec<String> {
        let declared = self.directory.get(product).map(|s| s.git_ref.as_str());
        let mut refs: Vec<String> = Vec::with_capacity(self.refs.len() + 2);
        let all = self.refs.iter().map(String::as_str).chain(declared).chain([DEFAULT_REF]);
        for r in all {
            if !refs.iter().any(|existing| existing == r) {
                refs.push(r.to_string());
            }
        }
        refs
    }
}
