//! Options shared by every command and assembly of the run components.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::config::{BuildConfig, StrategyKind};
use crate::declarations::TableFileProvider;
use crate::exclusion::ExclusionResolver;
use crate::mirror::SourceMirror;
use crate::resolver::DependencyGraphBuilder;
use crate::source::{RepositoryDirectory, SourceResolver};
use crate::tags::{FileTagRegistry, NullTagRegistry, TagRegistry};
use crate::version::{
    BaseVersionProvider, CommandVersionProvider, GitDescribeVersion, HashStrategy,
    RegistryStrategy, VersionResolver, VersionStrategy,
};
use crate::versiondb::VersionDb;

/// Run settings that override the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct RunOptions {
    /// Directory holding product working copies
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Ref to try before each product's declared ref (repeatable, most preferred first)
    #[arg(short = 'r', long = "ref", value_name = "REF")]
    pub refs: Vec<String>,

    /// `|`-separated repository URL patterns containing `%(product)s`
    #[arg(long, value_name = "PATTERNS")]
    pub repository_pattern: Option<String>,

    /// Repository-directory YAML file
    #[arg(long, value_name = "FILE")]
    pub repos: Option<PathBuf>,

    /// Optional-dependency exclusion rules
    #[arg(long, value_name = "FILE")]
    pub exclusions: Option<PathBuf>,

    /// Resolve refs against existing working copies without fetching
    #[arg(long)]
    pub no_fetch: bool,

    /// Version suffix strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyKind>,

    /// Version registry repository (registry strategy)
    #[arg(long, value_name = "DIR")]
    pub version_db: Option<PathBuf>,

    /// Tag file used for build-identifier allocation
    #[arg(long, value_name = "FILE")]
    pub tag_file: Option<PathBuf>,

    /// Hex digits kept from digests and commit ids
    #[arg(long, value_name = "NUM")]
    pub sha_abbrev: Option<usize>,

    /// External base-version command, run as `<cmd> <source_dir> <ref>`
    #[arg(long, value_name = "CMD")]
    pub version_command: Option<String>,
}

impl RunOptions {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut BuildConfig) {
        if let Some(dir) = &self.build_dir {
            config.build_dir = dir.clone();
        }
        if !self.refs.is_empty() {
            config.refs = self.refs.clone();
        }
        if let Some(patterns) = &self.repository_pattern {
            config.repository_pattern = Some(patterns.clone());
        }
        if let Some(repos) = &self.repos {
            config.repos = Some(repos.clone());
        }
        if let Some(exclusions) = &self.exclusions {
            config.exclusions = Some(exclusions.clone());
        }
        if self.no_fetch {
            config.fetch = false;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(db) = &self.version_db {
            config.version_db = Some(db.clone());
        }
        if let Some(tag_file) = &self.tag_file {
            config.tag_file = Some(tag_file.clone());
        }
        if let Some(abbrev) = self.sha_abbrev {
            config.sha_abbrev = abbrev;
        }
        if let Some(command) = &self.version_command {
            config.version_command = Some(command.clone());
        }
    }
}

pub(crate) fn source_mirror(config: &BuildConfig) -> Result<SourceMirror> {
    let directory = match &config.repos {
        Some(path) => RepositoryDirectory::load(path)?,
        None => RepositoryDirectory::new(),
    };
    let resolver =
        SourceResolver::new(directory, config.repository_pattern.as_deref(), config.refs.clone());
    Ok(SourceMirror::new(&config.build_dir, resolver).with_fetch_updates(config.fetch))
}

fn tag_registry(config: &BuildConfig) -> Box<dyn TagRegistry> {
    match &config.tag_file {
        Some(path) => Box::new(FileTagRegistry::new(path)),
        None => Box::new(NullTagRegistry),
    }
}

pub(crate) fn version_resolver(config: &BuildConfig) -> Result<VersionResolver> {
    let base: Box<dyn BaseVersionProvider> = match &config.version_command {
        Some(command) => Box::new(CommandVersionProvider::new(command)?),
        None => Box::new(GitDescribeVersion::new(config.sha_abbrev)),
    };
    let strategy: Box<dyn VersionStrategy> = match config.strategy {
        StrategyKind::Hash => Box::new(HashStrategy::new(config.sha_abbrev, tag_registry(config))),
        StrategyKind::Registry => {
            let root = config.version_db.as_ref().ok_or_else(|| {
                crate::core::BuildError::configuration("no version registry configured")
            })?;
            Box::new(RegistryStrategy::new(VersionDb::open(root)?, tag_registry(config)))
        }
    };
    Ok(VersionResolver::new(base, strategy))
}

/// Assemble the graph builder for a validated configuration.
pub(crate) fn graph_builder(config: &BuildConfig) -> Result<DependencyGraphBuilder> {
    Ok(DependencyGraphBuilder::new(
        Box::new(source_mirror(config)?),
        Box::new(TableFileProvider::new()),
        ExclusionResolver::load(config.exclusions.as_deref())?,
        version_resolver(config)?,
    ))
}
