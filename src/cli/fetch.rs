use anyhow::Result;
use clap::Args;

use super::common::{RunOptions, source_mirror};
use crate::config::BuildConfig;
use crate::mirror::ProductSource;

#[derive(Args, Debug)]
pub struct FetchCommand {
    /// Products to mirror
    #[arg(required = true, value_name = "PRODUCT")]
    pub products: Vec<String>,

    #[command(flatten)]
    pub run: RunOptions,
}

impl FetchCommand {
    /// Mirror each product and print `<product> <ref> <commit>`.
    pub fn execute(self, mut config: BuildConfig) -> Result<()> {
        self.run.apply(&mut config);
        crate::utils::ensure_writable_dir(&config.build_dir)?;

        let mut mirror = source_mirror(&config)?;
        for product in &self.products {
            let fetched = mirror.fetch(product)?;
            println!("{} {} {}", fetched.product, fetched.git_ref, fetched.commit);
        }
        Ok(())
    }
}
