//! HTTP clients for the services the pipeline reports to
//!
//! - [`storage_service`]: ingest and bag lookups against the storage service
//! - [`dlcs`]: image batch submission and status checks against DLCS

pub mod dlcs;
pub mod endpoints;
pub mod storage_service;

pub use dlcs::{DlcsClient, ImageBatchApi};
pub use storage_service::{StorageService, StorageServiceClient};
