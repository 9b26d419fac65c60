//! `save-index` and `load-index` commands

use crate::commands::open_store;
use crate::config::MigrationConfig;
use crate::error::Result;
use crate::store::snapshot;
use colored::Colorize;

pub async fn save(config: &MigrationConfig, index_name: &str, overwrite: bool) -> Result<()> {
    let store = open_store(config).await?;
    let path = config.snapshot_path(index_name);

    let written = snapshot::save_index(&store, index_name, &path, overwrite).await?;

    println!(
        "{} Saved {} documents from '{}' to {}",
        "✓".green(),
        written,
        index_name,
        path.display()
    );
    Ok(())
}

/// Load the snapshot of `index_name` into `target_index_name` (or back into
/// `index_name` when no target is given)
pub async fn load(
    config: &MigrationConfig,
    index_name: &str,
    target_index_name: Option<&str>,
    overwrite: bool,
) -> Result<()> {
    let store = open_store(config).await?;
    let path = config.snapshot_path(index_name);
    let target = target_index_name.unwrap_or(index_name);

    let read = snapshot::load_index(&store, &path, target, overwrite).await?;

    println!(
        "{} Loaded {} documents from {} into '{}'",
        "✓".green(),
        read,
        path.display(),
        target
    );
    Ok(())
}
