//! Command-line interface.
//!
//! ```text
//! buildprep [--config FILE] [-v|-q] prepare <product>... [--build-id ID] [--manifest FILE]
//! buildprep [--config FILE] [-v|-q] fetch <product>...
//! ```
//!
//! Both commands accept the run options in [`RunOptions`], which override the
//! configuration file and environment.

mod common;
mod fetch;
mod prepare;

pub use common::RunOptions;
pub use fetch::FetchCommand;
pub use prepare::PrepareCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::BuildConfig;

#[derive(Parser, Debug)]
#[command(
    name = "buildprep",
    version,
    about = "Fetch product sources and write a versioned, dependency-ordered build manifest"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: ./buildprep.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve products and their dependencies, then write the manifest
    Prepare(PrepareCommand),
    /// Mirror the named products only, without following dependencies
    Fetch(FetchCommand),
}

impl Cli {
    /// Default `EnvFilter` directive for the requested verbosity.
    pub fn log_directive(&self) -> &'static str {
        if self.verbose {
            "buildprep=debug"
        } else if self.quiet {
            "warn"
        } else {
            "buildprep=info"
        }
    }

    pub fn execute(self) -> Result<()> {
        let config = BuildConfig::load(self.config.as_deref())?;
        match self.command {
            Commands::Prepare(cmd) => cmd.execute(config),
            Commands::Fetch(cmd) => cmd.execute(config),
        }
    }
}
