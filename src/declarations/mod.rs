//! Per-product dependency declarations.
//!
//! The graph builder asks a [`DeclarationsProvider`] which products a checked-out
//! source tree depends on. The bundled [`TableFileProvider`] reads the
//! `ups/<product>.table` file shipped in each product's repository:
//!
//! ```text
//! setupRequired(base)
//! setupRequired(utils -j)
//! setupOptional(afwdata)
//! envPrepend(PYTHONPATH, ${PRODUCT_DIR}/python)
//! ```
//!
//! Only `setupRequired` and `setupOptional` statements matter here. Version
//! expressions and flags after the product name are ignored because every
//! dependency is built from the ref chosen for this run.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// One declared dependency edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    pub name: String,
    pub optional: bool,
}

impl DeclaredDependency {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: true,
        }
    }
}

/// Source of dependency declarations for a product's source tree.
pub trait DeclarationsProvider {
    /// Declared dependencies of `product`, in declaration order.
    fn dependencies(&self, product: &str, source_dir: &Path) -> Result<Vec<DeclaredDependency>>;
}

static SETUP_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*setup(Required|Optional)\s*\(\s*([A-Za-z0-9_.\-]+)[^)]*\)").expect("valid regex")
});

/// Reads `ups/<product>.table` files.
#[derive(Debug, Clone, Default)]
pub struct TableFileProvider;

impl TableFileProvider {
    pub fn new() -> Self {
        Self
    }

    /// Location of the table file inside a product's working copy.
    pub fn table_path(product: &str, source_dir: &Path) -> PathBuf {
        source_dir.join("ups").join(format!("{product}.table"))
    }

    /// Extract dependency statements from table-file text.
    pub fn parse(content: &str) -> Vec<DeclaredDependency> {
        content
            .lines()
            .map(|line| line.split('#').next().unwrap_or(""))
            .filter_map(|line| SETUP_STATEMENT.captures(line))
            .map(|caps| DeclaredDependency {
                name: caps[2].to_string(),
                optional: &caps[1] == "Optional",
            })
            .collect()
    }
}

impl DeclarationsProvider for TableFileProvider {
    fn dependencies(&self, product: &str, source_dir: &Path) -> Result<Vec<DeclaredDependency>> {
        let path = Self::table_path(product, source_dir);
        if !path.is_file() {
            tracing::debug!("{product}: no table file at {}", path.display());
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read table file {}", path.display()))?;
        Ok(Self::parse(&content))
    }
}
