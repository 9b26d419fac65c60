//! `create-*-index` commands

use crate::commands::open_store;
use crate::config::MigrationConfig;
use crate::error::Result;
use crate::models::{Decision, MiroFile, SourceData, SourceRecord};
use crate::pipeline::chunks::gather_chunks;
use crate::pipeline::registrations::gather_registrations;
use crate::pipeline::{build_index, read_export, BuildOutcome};
use colored::Colorize;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;

pub async fn create_sourcedata(config: &MigrationConfig, source: Option<PathBuf>, overwrite: bool) -> Result<()> {
    from_export::<SourceData>(config, &config.indices.sourcedata, source, overwrite).await
}

pub async fn create_files(config: &MigrationConfig, source: Option<PathBuf>, overwrite: bool) -> Result<()> {
    from_export::<MiroFile>(config, &config.indices.files, source, overwrite).await
}

pub async fn create_decisions(config: &MigrationConfig, source: Option<PathBuf>, overwrite: bool) -> Result<()> {
    from_export::<Decision>(config, &config.indices.decisions, source, overwrite).await
}

/// Build the chunks index from the decisions index
pub async fn create_chunks(config: &MigrationConfig, overwrite: bool) -> Result<()> {
    let store = open_store(config).await?;

    let chunks = gather_chunks(&store, &config.indices.decisions, config.chunk_size).await?;
    let documents = chunks
        .iter()
        .map(|chunk| -> Result<(String, serde_json::Value)> {
            Ok((chunk.chunk_id(), serde_json::to_value(chunk)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let expected = documents.len() as u64;
    let outcome = build_index(&store, &config.indices.chunks, expected, documents, overwrite).await?;
    report(&config.indices.chunks, &outcome);
    Ok(())
}

/// Build the registrations index from the sourcedata and decisions indices
pub async fn create_registrations(config: &MigrationConfig, overwrite: bool) -> Result<()> {
    let store = open_store(config).await?;

    let registrations =
        gather_registrations(&store, &config.indices.sourcedata, &config.indices.decisions).await?;
    let documents = registrations
        .iter()
        .map(|registration| -> Result<(String, serde_json::Value)> {
            Ok((registration.miro_id.clone(), serde_json::to_value(registration)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let expected = documents.len() as u64;
    let outcome =
        build_index(&store, &config.indices.registrations, expected, documents, overwrite).await?;
    report(&config.indices.registrations, &outcome);
    Ok(())
}

async fn from_export<T>(
    config: &MigrationConfig,
    index: &str,
    source: Option<PathBuf>,
    overwrite: bool,
) -> Result<()>
where
    T: DeserializeOwned + Serialize + SourceRecord,
{
    let path = source.unwrap_or_else(|| config.export_path(index));
    println!("{} Reading {}", "→".cyan(), path.display());

    let documents = read_export::<T>(&path)?;
    let expected = documents.len() as u64;

    let store = open_store(config).await?;
    let outcome = build_index(&store, index, expected, documents, overwrite).await?;
    report(index, &outcome);
    Ok(())
}

fn report(index: &str, outcome: &BuildOutcome) {
    match outcome {
        BuildOutcome::AlreadyPopulated { count } => println!(
            "{} Index '{}' already holds {} documents, skipping (use --overwrite to rebuild)",
            "✓".green(),
            index,
            count
        ),
        BuildOutcome::Built { written, count } => println!(
            "{} Index '{}' built: {} written, {} stored",
            "✓".green(),
            index,
            written,
            count
        ),
    }
}
