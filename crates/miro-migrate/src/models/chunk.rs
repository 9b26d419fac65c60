//! Chunk model
//!
//! A chunk is a group of source objects that travel to the storage service
//! together as a single transfer package.

use chrono::{DateTime, Utc};
use miro_common::S3Location;
use serde::{Deserialize, Serialize};

/// A named group of source objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Destination group the source objects were sorted into
    pub group_name: String,
    /// Position of the chunk within its group, starting at 1
    pub chunk_index: u32,
    /// Source object keys, in package order
    pub s3_keys: Vec<String>,
    #[serde(default)]
    pub transfer_package: Option<TransferPackage>,
}

/// Where a chunk's package lives, and whether it has been written there
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPackage {
    pub location: S3Location,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub upload: Option<PackageUpload>,
}

/// Proof that the package was written, recorded after the put succeeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageUpload {
    pub uploaded_at: DateTime<Utc>,
    pub content_length: u64,
    /// Hex SHA-256 of the package bytes
    pub sha256: String,
}

impl Chunk {
    pub fn new(group_name: impl Into<String>, chunk_index: u32, s3_keys: Vec<String>) -> Self {
        Self {
            group_name: group_name.into(),
            chunk_index,
            s3_keys,
            transfer_package: None,
        }
    }

    /// Stable document id: the same group and index always give the same id
    pub fn chunk_id(&self) -> String {
        format!("{}_{}", self.group_name, self.chunk_index)
    }

    /// Identifier the storage service knows the package by.
    ///
    /// Group names come from folder paths and may contain spaces, which the
    /// storage service does not accept in an external identifier.
    pub fn external_identifier(&self) -> String {
        self.chunk_id().replace(' ', "_")
    }

    pub fn is_uploaded(&self) -> bool {
        self.transfer_package
            .as_ref()
            .is_some_and(|package| package.upload.is_some())
    }
}

impl TransferPackage {
    pub fn new(location: S3Location) -> Self {
        Self {
            location,
            created_at: Utc::now(),
            upload: None,
        }
    }
}
