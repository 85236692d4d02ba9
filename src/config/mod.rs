//! Run configuration.
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults ([`BuildConfig::default`])
//! 2. a TOML file: `--config <path>`, or `buildprep.toml` in the working
//!    directory when present
//! 3. environment variables [`ENV_BUILD_DIR`] and [`ENV_VERSION_DB`]
//! 4. command-line flags, applied by the CLI
//!
//! ```toml
//! build-dir = "/work/build"
//! refs = ["tickets/DM-1234", "w.2026.40"]
//! repository-pattern = "https://github.com/lsst/%(product)s.git"
//! repos = "etc/repos.yaml"
//! exclusions = "etc/exclusions.txt"
//! strategy = "registry"
//! version-db = "/work/versiondb"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::BuildError;
use crate::utils;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "buildprep.toml";
pub const ENV_BUILD_DIR: &str = "BUILDPREP_BUILD_DIR";
pub const ENV_VERSION_DB: &str = "BUILDPREP_VERSION_DB";

/// Which suffix strategy versions products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Abbreviated dependency-set digest
    #[default]
    Hash,
    /// Integer suffixes persisted in a version registry
    Registry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Directory holding one working copy per product
    pub build_dir: PathBuf,
    /// Refs to try before each product's declared ref, most preferred first
    pub refs: Vec<String>,
    /// `|`-separated URL patterns containing `%(product)s`
    pub repository_pattern: Option<String>,
    /// Repository-directory YAML file
    pub repos: Option<PathBuf>,
    /// Exclusion rules file
    pub exclusions: Option<PathBuf>,
    /// Hex digits kept from the dependency digest (hash strategy) and commit
    /// ids in base versions
    pub sha_abbrev: usize,
    /// Fetch from remotes before resolving refs
    pub fetch: bool,
    pub strategy: StrategyKind,
    /// Version registry repository (registry strategy)
    pub version_db: Option<PathBuf>,
    /// Whitespace-separated tag file used to allocate build identifiers
    pub tag_file: Option<PathBuf>,
    /// External base-version command, run as `<cmd> <source_dir> <ref>`
    pub version_command: Option<String>,
    /// Where the manifest is written; defaults to `<build_dir>/manifest.txt`
    pub manifest: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            refs: Vec::new(),
            repository_pattern: None,
            repos: None,
            exclusions: None,
            sha_abbrev: 10,
            fetch: true,
            strategy: StrategyKind::Hash,
            version_db: None,
            tag_file: None,
            version_command: None,
            manifest: None,
        }
    }
}

impl BuildConfig {
    /// Parse TOML configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BuildError::configuration(format!("invalid configuration: {e}")).into())
    }

    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] in the
    /// working directory if it exists, or fall back to defaults. Environment
    /// overrides are applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_BUILD_DIR).filter(|v| !v.is_empty()) {
            self.build_dir = PathBuf::from(dir);
        }
        if let Some(db) = lookup(ENV_VERSION_DB).filter(|v| !v.is_empty()) {
            self.version_db = Some(PathBuf::from(db));
        }
    }

    /// Manifest output location.
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest.clone().unwrap_or_else(|| self.build_dir.join("manifest.txt"))
    }

    /// Check settings that can be verified before any work starts.
    pub fn validate(&self) -> Result<()> {
        utils::ensure_writable_dir(&self.build_dir)?;
        if self.sha_abbrev == 0 || self.sha_abbrev > 40 {
            return Err(BuildError::configuration(format!(
                "sha-abbrev must be between 1 and 40, got {}",
                self.sha_abbrev
            ))
            .into());
        }
        if self.strategy == StrategyKind::Registry && self.version_db.is_none() {
            return Err(BuildError::configuration(
                "the registry strategy needs a version registry (--version-db or BUILDPREP_VERSION_DB)",
            )
            .into());
        }
        for (what, path) in [("repository directory", &self.repos), ("exclusions file", &self.exclusions)] {
            if let Some(path) = path
                && !path.is_file()
            {
                return Err(BuildError::configuration(format!(
                    "{what} '{}' does not exist",
                    path.display()
                ))
                .into());
            }
        }
        Ok(())
    }
}
