//! `dlcs-send-registrations` and `dlcs-update-registrations` commands

use crate::api::DlcsClient;
use crate::commands::{api_timeout, open_store};
use crate::config::MigrationConfig;
use crate::error::Result;
use crate::pipeline::{RegistrationBatcher, RegistrationStatusReconciler};
use colored::Colorize;

/// Submit up to `limit` batches of pending registrations
pub async fn send(config: &MigrationConfig, limit: usize) -> Result<()> {
    let store = open_store(config).await?;
    let dlcs = DlcsClient::new(&config.dlcs, api_timeout(config))?;

    let batcher = RegistrationBatcher::new(
        &store,
        &dlcs,
        &config.indices.registrations,
        config.dlcs_batch_size,
    );
    let summary = batcher.send(limit).await?;

    if summary.submitted.is_empty() && summary.failed == 0 {
        println!("No registrations waiting for a batch.");
        return Ok(());
    }

    for (counter, (batch_id, size)) in summary.submitted.iter().enumerate() {
        println!("Requesting batch {}: {} ({} images)", counter, batch_id, size);
    }
    println!(
        "{} {} registrations sent in {} batches",
        "✓".green(),
        summary.registrations(),
        summary.submitted.len()
    );
    if summary.failed > 0 {
        println!("{} {} batches were rejected and will be retried", "!".yellow(), summary.failed);
    }
    Ok(())
}

/// Check DLCS for up to `limit` batched registrations
pub async fn update(config: &MigrationConfig, limit: usize, recheck_successful: bool) -> Result<()> {
    let store = open_store(config).await?;
    let dlcs = DlcsClient::new(&config.dlcs, api_timeout(config))?;

    let reconciler = RegistrationStatusReconciler::new(&store, &dlcs, &config.indices.registrations);
    let summary = reconciler.update(limit, recheck_successful).await?;

    println!("{}", "Registrations:".cyan().bold());
    println!("  Checked:          {}", summary.checked);
    println!("  Batch succeeded:  {}", summary.batch_succeeded.to_string().green());
    println!("  Image succeeded:  {}", summary.image_succeeded.to_string().green());
    println!("  Not successful:   {}", summary.failed.len().to_string().yellow());
    if !summary.failed.is_empty() {
        println!("  {:?}", summary.failed);
    }
    Ok(())
}
