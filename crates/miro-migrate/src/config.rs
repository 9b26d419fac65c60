//! Configuration for the migration tool
//!
//! All settings come from environment variables (optionally loaded from a
//! `.env` file in `main`). Credentials are optional at load time so that the
//! index-building commands work without them; the clients that need them
//! fail with a [`MigrationError::Config`] when they are missing.

use crate::error::{MigrationError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Directory holding upstream exports, the index database and snapshots
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Source records per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Registrations per DLCS batch
pub const DEFAULT_DLCS_BATCH_SIZE: usize = 10;

/// Timeout for storage service and DLCS requests, in seconds
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 300;

/// Names of the document indices the pipeline reads and writes.
///
/// Passed explicitly to every component instead of shared constants so a
/// test (or a second environment) can point the pipeline at other indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNames {
    pub sourcedata: String,
    pub files: String,
    pub decisions: String,
    pub chunks: String,
    pub transfers: String,
    pub registrations: String,
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            sourcedata: "sourcedata".to_string(),
            files: "files".to_string(),
            decisions: "decisions".to_string(),
            chunks: "chunks".to_string(),
            transfers: "transfers".to_string(),
            registrations: "registrations".to_string(),
        }
    }
}

impl IndexNames {
    pub fn all(&self) -> [&str; 6] {
        [
            &self.sourcedata,
            &self.files,
            &self.decisions,
            &self.chunks,
            &self.transfers,
            &self.registrations,
        ]
    }
}

/// Buckets and prefixes the transfer stages move packages between
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Bucket holding the original Miro objects
    pub source_bucket: String,
    /// Where built transfer packages are written
    pub transfer_bucket: String,
    pub transfer_prefix: String,
    /// Storage service handoff location watched for new packages
    pub upload_bucket: String,
    pub upload_prefix: String,
}

/// S3 connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

/// Storage service API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageServiceConfig {
    pub api_url: String,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub space: String,
}

/// DLCS API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlcsConfig {
    pub api_url: String,
    pub customer_id: u32,
    pub space_id: u32,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Base URL the DLCS fetches image origins from; the file id is appended
    pub origin_base_url: String,
}

/// Complete migration tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub data_dir: PathBuf,
    pub index_db: PathBuf,
    pub snapshot_dir: PathBuf,
    pub indices: IndexNames,
    pub chunk_size: usize,
    pub dlcs_batch_size: usize,
    pub api_timeout_secs: u64,
    pub transfer: TransferConfig,
    pub s3: S3Config,
    pub storage_service: StorageServiceConfig,
    pub dlcs: DlcsConfig,
}

impl MigrationConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let data_dir = PathBuf::from(get("MIGRATION_DATA_DIR", DEFAULT_DATA_DIR));
        let index_db = lookup("MIGRATION_INDEX_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("indices.db"));
        let snapshot_dir = lookup("MIGRATION_SNAPSHOT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("snapshots"));

        Ok(Self {
            index_db,
            snapshot_dir,
            indices: IndexNames::default(),
            chunk_size: parse_number(&lookup, "MIGRATION_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            dlcs_batch_size: parse_number(&lookup, "DLCS_BATCH_SIZE", DEFAULT_DLCS_BATCH_SIZE)?,
            api_timeout_secs: parse_number(
                &lookup,
                "MIGRATION_API_TIMEOUT_SECS",
                DEFAULT_API_TIMEOUT_SECS,
            )?,
            transfer: TransferConfig {
                source_bucket: get("SOURCE_BUCKET", "wellcomecollection-miro-images-public"),
                transfer_bucket: get("TRANSFER_BUCKET", "wellcomecollection-assets-miro-transfer"),
                transfer_prefix: get("TRANSFER_PREFIX", "transfer_packages"),
                upload_bucket: get("UPLOAD_BUCKET", "wellcomecollection-storage-staging-ingests"),
                upload_prefix: get("UPLOAD_PREFIX", "miro"),
            },
            s3: S3Config {
                endpoint: lookup("S3_ENDPOINT"),
                region: get("S3_REGION", "eu-west-1"),
                access_key: lookup("S3_ACCESS_KEY").or_else(|| lookup("AWS_ACCESS_KEY_ID")),
                secret_key: lookup("S3_SECRET_KEY").or_else(|| lookup("AWS_SECRET_ACCESS_KEY")),
                path_style: parse_bool(&lookup, "S3_PATH_STYLE"),
            },
            storage_service: StorageServiceConfig {
                api_url: get("STORAGE_API_URL", "https://api-stage.wellcomecollection.org/storage/v1"),
                token_url: lookup("STORAGE_TOKEN_URL"),
                client_id: lookup("STORAGE_CLIENT_ID"),
                client_secret: lookup("STORAGE_CLIENT_SECRET"),
                space: get("STORAGE_SPACE", "miro"),
            },
            dlcs: DlcsConfig {
                api_url: get("DLCS_API_URL", "https://api.dlcs.io"),
                customer_id: parse_number(&lookup, "DLCS_CUSTOMER_ID", 2)?,
                space_id: parse_number(&lookup, "DLCS_SPACE_ID", 8)?,
                api_key: lookup("DLCS_API_KEY"),
                api_secret: lookup("DLCS_API_SECRET"),
                origin_base_url: get("DLCS_ORIGIN_BASE_URL", "https://iiif-origin.wellcomecollection.org"),
            },
            data_dir,
        })
    }

    /// Default location of an upstream JSON-lines export
    pub fn export_path(&self, index_name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.jsonl", index_name))
    }

    /// Location of a saved index snapshot
    pub fn snapshot_path(&self, index_name: &str) -> PathBuf {
        self.snapshot_dir.join(format!("{}.jsonl", index_name))
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| MigrationError::config(format!("{} must be a number, got '{}'", key, raw))),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<MigrationConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MigrationConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.index_db, PathBuf::from(DEFAULT_DATA_DIR).join("indices.db"));
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.dlcs_batch_size, DEFAULT_DLCS_BATCH_SIZE);
        assert_eq!(config.indices.chunks, "chunks");
        assert!(config.storage_service.client_id.is_none());
        assert!(!config.s3.path_style);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("MIGRATION_DATA_DIR", "/srv/miro"),
            ("DLCS_BATCH_SIZE", "25"),
            ("S3_PATH_STYLE", "true"),
            ("AWS_ACCESS_KEY_ID", "key"),
        ])
        .unwrap();

        assert_eq!(config.index_db, PathBuf::from("/srv/miro/indices.db"));
        assert_eq!(config.snapshot_path("chunks"), PathBuf::from("/srv/miro/snapshots/chunks.jsonl"));
        assert_eq!(config.export_path("decisions"), PathBuf::from("/srv/miro/decisions.jsonl"));
        assert_eq!(config.dlcs_batch_size, 25);
        assert!(config.s3.path_style);
        assert_eq!(config.s3.access_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_invalid_number() {
        let err = config_from(&[("MIGRATION_CHUNK_SIZE", "lots")]).unwrap_err();
        assert!(matches!(err, MigrationError::Config(_)));
    }
}
