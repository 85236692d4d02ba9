//! buildprep - reproducible build manifests for git-hosted product distributions
//!
//! Given a set of top-level product names, buildprep discovers their dependency
//! graph from per-product declarations, mirrors each product's source from git at
//! a resolved ref, derives a deterministic version per product that encodes its
//! exact dependency set, and writes a topologically ordered manifest.
//!
//! # Architecture Overview
//!
//! - [`mirror::SourceMirror`] keeps one working copy per product and checks out
//!   the most preferred resolvable ref
//! - [`resolver::DependencyGraphBuilder`] walks declared dependencies depth-first,
//!   fetching and versioning every distinct product exactly once
//! - [`version::VersionResolver`] appends a dependency-set suffix to each base
//!   version, either an abbreviated digest ([`version::HashStrategy`]) or a
//!   persistent integer ([`version::RegistryStrategy`])
//! - [`manifest::Manifest`] is the sorted result, with a bit-exact text format
//! - [`versiondb::VersionDb`] is the append-only registry behind the integer
//!   suffixes, and publishes each build as a tagged commit
//!
//! # Core Modules
//!
//! ## Core Functionality
//! - [`cli`] - `prepare` and `fetch` commands
//! - [`config`] - TOML configuration with environment and flag overrides
//! - [`core`] - Products and the error taxonomy
//! - [`resolver`] - Dependency graph construction
//!
//! ## Git Integration
//! - [`git`] - System `git` wrapper
//! - [`mirror`] - Per-product working copies
//! - [`source`] - Repository directory and origin/ref candidates
//!
//! ## Versions and Manifests
//! - [`declarations`] - `ups/<product>.table` dependency declarations
//! - [`exclusion`] - Optional-dependency exclusion rules
//! - [`manifest`] - Manifest ordering, text format and content hash
//! - [`tags`] - Build identifiers
//! - [`version`] - Base versions and suffix strategies
//! - [`versiondb`] - Persistent version registry
//!
//! ## Supporting Modules
//! - [`utils`] - Hashing and file helpers
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Resolve afw and everything it needs, preferring a ticket branch
//! buildprep prepare afw --ref tickets/DM-1234 \
//!     --repository-pattern 'https://github.com/lsst/%(product)s.git'
//!
//! # Stable integer suffixes and published build identifiers
//! buildprep prepare lsst_distrib --strategy registry --version-db /work/versiondb
//!
//! # Mirror a single product
//! buildprep fetch afw
//! ```

// Core functionality modules
pub mod cli;
pub mod config;
pub mod core;
pub mod resolver;

// Git integration
pub mod git;
pub mod mirror;
pub mod source;

// Versions and manifests
pub mod declarations;
pub mod exclusion;
pub mod manifest;
pub mod tags;
pub mod version;
pub mod versiondb;

// Supporting modules
pub mod utils;
