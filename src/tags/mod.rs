//! Build-identifier bookkeeping.
//!
//! Build identifiers follow the `b<integer>` convention (`b1`, `b2`, ...). A
//! [`TagRegistry`] lists identifiers already handed out elsewhere and records
//! new ones. [`next_build_id`] picks the next free identifier from any number of
//! such listings.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::core::BuildError;

static BUILD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^b(\d+)$").expect("valid regex"));

/// Numeric part of a `b<integer>` identifier.
pub fn parse_build_number(id: &str) -> Option<u64> {
    BUILD_ID.captures(id).and_then(|c| c[1].parse().ok())
}

pub fn is_build_id(id: &str) -> bool {
    parse_build_number(id).is_some()
}

/// The smallest `b<n>` with `n` greater than every existing build number that is
/// not itself among `existing`.
///
/// Fails with a configuration error when the existing numbers leave no room
/// above them.
pub fn next_build_id<I, S>(existing: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let reserved: HashSet<String> = existing.into_iter().map(|s| s.as_ref().to_string()).collect();
    let max = reserved.iter().filter_map(|id| parse_build_number(id)).max().unwrap_or(0);
    let exhausted = || BuildError::configuration(format!("no build identifier is free above b{max}"));
    let mut n = max.checked_add(1).ok_or_else(exhausted)?;
    while reserved.contains(&format!("b{n}")) {
        n = n.checked_add(1).ok_or_else(exhausted)?;
    }
    Ok(format!("b{n}"))
}

/// External registry of build identifiers.
pub trait TagRegistry {
    /// Every registered identifier matching the `b<integer>` convention.
    fn list_build_ids(&self) -> Result<Vec<String>>;

    /// Record `id` as taken.
    fn register(&mut self, id: &str) -> Result<()>;
}

/// Registry that knows no identifiers and records nothing.
#[derive(Debug, Default, Clone)]
pub struct NullTagRegistry;

impl TagRegistry for NullTagRegistry {
    fn list_build_ids(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn register(&mut self, _id: &str) -> Result<()> {
        Ok(())
    }
}

/// Tag names stored whitespace-separated in a text file.
#[derive(Debug, Clone)]
pub struct FileTagRegistry {
    path: PathBuf,
}

impl FileTagRegistry {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read_all(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read tag file {}", self.path.display()))?;
        Ok(content.split_whitespace().map(String::from).collect())
    }
}

impl TagRegistry for FileTagRegistry {
    fn list_build_ids(&self) -> Result<Vec<String>> {
        Ok(self.read_all()?.into_iter().filter(|t| is_build_id(t)).collect())
    }

    fn register(&mut self, id: &str) -> Result<()> {
        if self.read_all()?.iter().any(|t| t == id) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open tag file {}", self.path.display()))?;
        let needs_separator = std::fs::read_to_string(&self.path)
            .map(|c| !c.is_empty() && !c.ends_with(char::is_whitespace))
            .unwrap_or(false);
        let separator = if needs_separator { "\n" } else { "" };
        writeln!(file, "{separator}{id}")
            .with_context(|| format!("Failed to append to tag file {}", self.path.display()))?;
        tracing::info!("Registered build identifier {id}");
        Ok(())
    }
}
