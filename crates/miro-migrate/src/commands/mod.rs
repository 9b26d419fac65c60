//! CLI command implementations
//!
//! Each subcommand has its own module. Commands open the index store and
//! whatever clients they need, run one pipeline stage and print the result.

pub mod dlcs;
pub mod indices;
pub mod snapshot;
pub mod status;
pub mod transfer;
pub mod upload;

use crate::config::MigrationConfig;
use crate::error::Result;
use crate::store::SqliteIndexStore;
use std::time::Duration;

/// Open the index database named in the configuration
pub async fn open_store(config: &MigrationConfig) -> Result<SqliteIndexStore> {
    SqliteIndexStore::open(&config.index_db).await
}

fn api_timeout(config: &MigrationConfig) -> Duration {
    Duration::from_secs(config.api_timeout_secs)
}
