//! `upload-transfer-packages` command

use crate::api::StorageServiceClient;
use crate::commands::{api_timeout, open_store};
use crate::config::MigrationConfig;
use crate::error::Result;
use crate::models::StorageServiceState;
use crate::pipeline::upload::CopyOutcome;
use crate::pipeline::{ChunkReport, UploadOptions, UploadReconciler, UploadRun};
use crate::storage::S3ObjectStore;
use colored::Colorize;

pub async fn run(config: &MigrationConfig, options: UploadOptions) -> Result<()> {
    let store = open_store(config).await?;
    let objects = S3ObjectStore::new(&config.s3).await?;
    let storage_service =
        StorageServiceClient::with_oauth(&config.storage_service, api_timeout(config)).await?;

    let reconciler = UploadReconciler::new(
        &store,
        &objects,
        &storage_service,
        &config.indices,
        &config.transfer,
        &config.storage_service.space,
    );

    let summary = match reconciler.run(&options, print_report).await? {
        UploadRun::UnknownChunk(chunk_id) => {
            println!("No chunk found matching id: '{}'", chunk_id);
            return Ok(());
        }
        UploadRun::Completed(summary) => summary,
    };

    println!(
        "Found {} bags from {} packages.",
        summary.bags_found(),
        summary.attempted()
    );
    println!("No bags found for: {:?}", summary.missing_bags());
    Ok(())
}

fn print_report(report: &ChunkReport) {
    println!("Looking at '{}':", report.chunk_id);

    match &report.copy {
        CopyOutcome::Copied(location) => {
            println!("Not found. Copying '{}' to {}", report.chunk_id, location)
        }
        CopyOutcome::Found(location) => println!("Found '{}' at {}", report.chunk_id, location),
        CopyOutcome::Missing => println!("No upload recorded for '{}'", report.chunk_id),
    }

    if let Some(error) = &report.error {
        println!("{}", format!("Failed: {}", error).red());
    }

    match &report.storage_service {
        StorageServiceState::Ingesting { ingest } => {
            println!(
                "{}",
                format!("Found ingest {}, with status: {}", ingest.id, ingest.status.id).yellow()
            );
        }
        StorageServiceState::Stored { ingest_id, .. } => {
            println!(
                "{}",
                format!("Found ingest {}, with status: succeeded", ingest_id).green()
            );
        }
        StorageServiceState::NotFound => {}
    }

    match report.storage_service.bag() {
        Some(bag) => println!(
            "{}",
            format!(
                "Found bag {}, (v{}) with internal id: {}",
                bag.id,
                bag.version.trim_start_matches('v'),
                bag.info.internal_sender_identifier.as_deref().unwrap_or("-")
            )
            .bright_green()
        ),
        None => println!("{}", "No bag!".cyan()),
    }
    println!();
}
