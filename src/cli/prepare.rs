use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::common::{RunOptions, graph_builder};
use crate::config::BuildConfig;

#[derive(Args, Debug)]
pub struct PrepareCommand {
    /// Root products to build
    #[arg(required = true, value_name = "PRODUCT")]
    pub products: Vec<String>,

    /// Use this build identifier instead of allocating one
    #[arg(long, value_name = "ID")]
    pub build_id: Option<String>,

    /// Manifest output path (default: <build-dir>/manifest.txt)
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    #[command(flatten)]
    pub run: RunOptions,
}

impl PrepareCommand {
    /// Fetch and version the product graph, commit it, then write and print the
    /// manifest. Nothing is written if any step fails before the commit.
    pub fn execute(self, mut config: BuildConfig) -> Result<()> {
        self.run.apply(&mut config);
        if let Some(path) = &self.manifest {
            config.manifest = Some(path.clone());
        }
        config.validate()?;

        let mut builder = graph_builder(&config)?;
        let mut manifest = builder.construct(&self.products)?;
        let build_id = builder.commit(&mut manifest, self.build_id.as_deref())?;

        let path = config.manifest_path();
        manifest
            .to_file(&path)
            .with_context(|| format!("Failed to write manifest {}", path.display()))?;
        tracing::info!(
            "Wrote manifest for build {build_id} ({} products) to {}",
            manifest.len(),
            path.display()
        );
        print!("{}", manifest.to_text());
        Ok(())
    }
}
