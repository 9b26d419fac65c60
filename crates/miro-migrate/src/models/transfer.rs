//! Upload (transfer) records
//!
//! One record per chunk, keyed by chunk id, describing how far the chunk's
//! package has travelled into the storage service:
//!
//! ```text
//! NoRecord ──copy──▶ PackageCopied ──ingest seen──▶ IngestSubmitted ──bag seen──▶ Bagged
//! ```
//!
//! A bag is only ever stored alongside the succeeded ingest that produced it.

use chrono::{DateTime, Utc};
use miro_common::S3Location;
use serde::{Deserialize, Serialize};

/// Status reported by the storage service for an ingest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStatus {
    pub id: String,
}

impl IngestStatus {
    pub fn succeeded(&self) -> bool {
        self.id == "succeeded"
    }
}

/// An ingest as returned by the storage service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingest {
    pub id: String,
    pub status: IngestStatus,
}

impl Ingest {
    pub fn succeeded(&self) -> bool {
        self.status.succeeded()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BagInfo {
    pub internal_sender_identifier: Option<String>,
}

/// A stored bag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bag {
    pub id: String,
    pub version: String,
    pub info: BagInfo,
}

/// What the storage service knows about a chunk's package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StorageServiceState {
    #[default]
    NotFound,
    Ingesting { ingest: Ingest },
    Stored { ingest_id: String, bag: Bag },
}

impl StorageServiceState {
    /// Combine an ingest lookup with a bag lookup.
    ///
    /// A bag is only kept when the ingest succeeded; a bag reported next to
    /// an unfinished ingest belongs to an earlier version and is ignored.
    pub fn from_lookups(ingest: Option<Ingest>, bag: Option<Bag>) -> Self {
        match (ingest, bag) {
            (Some(ingest), Some(bag)) if ingest.succeeded() => Self::Stored {
                ingest_id: ingest.id,
                bag,
            },
            (Some(ingest), _) => Self::Ingesting { ingest },
            (None, _) => Self::NotFound,
        }
    }

    pub fn bag(&self) -> Option<&Bag> {
        match self {
            Self::Stored { bag, .. } => Some(bag),
            _ => None,
        }
    }
}

/// Position of a chunk in the upload state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UploadState {
    NoRecord,
    PackageCopied,
    IngestSubmitted,
    Bagged,
}

/// Upload record for one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub chunk_id: String,
    /// Handoff location the package was copied to
    #[serde(default)]
    pub upload_transfer: Option<S3Location>,
    #[serde(default)]
    pub storage_service: StorageServiceState,
    pub updated_at: DateTime<Utc>,
}

impl TransferRecord {
    pub fn new(chunk_id: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            upload_transfer: None,
            storage_service: StorageServiceState::NotFound,
            updated_at: Utc::now(),
        }
    }

    /// A record with neither a copied package nor a bag carries no progress
    pub fn is_empty(&self) -> bool {
        self.upload_transfer.is_none() && self.storage_service.bag().is_none()
    }

    pub fn state(&self) -> UploadState {
        match &self.storage_service {
            StorageServiceState::Stored { .. } => UploadState::Bagged,
            StorageServiceState::Ingesting { .. } => UploadState::IngestSubmitted,
            StorageServiceState::NotFound if self.upload_transfer.is_some() => {
                UploadState::PackageCopied
            }
            StorageServiceState::NotFound => UploadState::NoRecord,
        }
    }
}
