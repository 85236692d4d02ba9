//! Base-version inference from a product's own source tree.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

use crate::git::GitRepo;

/// Infers the version of a checked-out source tree, ignoring its dependencies.
pub trait BaseVersionProvider {
    fn base_version(&self, source_dir: &Path, git_ref: &str) -> Result<String>;
}

/// Derives the base version from git: an exact tag at HEAD wins, otherwise
/// `<ref>-g<abbreviated commit>`.
#[derive(Debug, Clone)]
pub struct GitDescribeVersion {
    abbrev: usize,
}

impl GitDescribeVersion {
    pub fn new(abbrev: usize) -> Self {
        Self { abbrev }
    }
}

impl Default for GitDescribeVersion {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Replace characters that cannot appear in a version token with `.`.
pub fn sanitize_version(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '.' })
        .collect()
}

impl BaseVersionProvider for GitDescribeVersion {
    fn base_version(&self, source_dir: &Path, git_ref: &str) -> Result<String> {
        let repo = GitRepo::new(source_dir);
        if let Some(tag) = repo.exact_tag()? {
            let tag = match tag.strip_prefix('v') {
                Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
                _ => tag.as_str(),
            };
            return Ok(sanitize_version(tag));
        }
        let short = repo.head_short(self.abbrev)?;
        Ok(format!("{}-g{}", sanitize_version(git_ref), short))
    }
}

/// Runs an external command as `<command...> <source_dir> <ref>` and uses its
/// trimmed standard output as the base version.
#[derive(Debug, Clone)]
pub struct CommandVersionProvider {
    program: String,
    args: Vec<String>,
}

impl CommandVersionProvider {
    /// `command` is split on whitespace into program and leading arguments.
    pub fn new(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty base-version command"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl BaseVersionProvider for CommandVersionProvider {
    fn base_version(&self, source_dir: &Path, git_ref: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(source_dir)
            .arg(git_ref)
            .output()
            .with_context(|| format!("Failed to run base-version command '{}'", self.program))?;
        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "base-version command '{}' failed for {}: {}",
                self.program,
                source_dir.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if version.is_empty() || version.contains(char::is_whitespace) {
            return Err(anyhow::anyhow!(
                "base-version command '{}' printed an unusable version {:?} for {}",
                self.program,
                version,
                source_dir.display()
            ));
        }
        Ok(version)
    }
}
