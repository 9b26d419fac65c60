//! `transfer-package-chunks` command

use crate::commands::open_store;
use crate::config::MigrationConfig;
use crate::error::Result;
use crate::pipeline::TransferPackageBuilder;
use crate::storage::S3ObjectStore;
use colored::Colorize;

pub async fn run(config: &MigrationConfig) -> Result<()> {
    let store = open_store(config).await?;
    let objects = S3ObjectStore::new(&config.s3).await?;

    let builder = TransferPackageBuilder::new(&objects, &config.transfer);
    let summary = builder.transfer_chunks(&store, &config.indices.chunks).await?;

    println!();
    println!("{}", "Summary:".cyan().bold());
    println!("  Verified: {}", summary.verified.len());
    println!("  Rebuilt:  {}", summary.rebuilt.len());
    println!("  Uploaded: {}", summary.uploaded.len());
    if summary.failed.is_empty() {
        println!("  Failed:   0");
    } else {
        println!("  Failed:   {} {:?}", summary.failed.len().to_string().red(), summary.failed);
    }
    Ok(())
}
