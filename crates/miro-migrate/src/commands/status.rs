//! `index-status` command
//!
//! Shows how many documents each pipeline index holds.

use crate::commands::open_store;
use crate::config::MigrationConfig;
use crate::error::Result;
use crate::store::IndexStore;
use colored::Colorize;

pub async fn run(config: &MigrationConfig) -> Result<()> {
    let store = open_store(config).await?;

    println!("{}", "Indices:".cyan().bold());
    for index in config.indices.all() {
        if store.index_exists(index).await? {
            let count = store.count(index).await?;
            println!("  {:<15} {}", index, count.to_string().green());
        } else {
            println!("  {:<15} {}", index, "not created".dimmed());
        }
    }

    println!();
    println!("  Database: {}", config.index_db.display());
    Ok(())
}
