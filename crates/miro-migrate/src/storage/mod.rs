//! Object storage
//!
//! The pipeline only needs four primitives from S3: a head (existence and
//! size), a server-side copy, a get and a put. [`ObjectStore`] is the seam;
//! [`S3ObjectStore`] is the production implementation.

pub mod s3;

pub use s3::S3ObjectStore;

use crate::error::Result;
use async_trait::async_trait;
use miro_common::S3Location;

/// Object storage operations used by the transfer stages
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Size of the object at `location`, or `None` when there is no object
    async fn head(&self, location: &S3Location) -> Result<Option<u64>>;

    /// Server-side copy; `destination` is overwritten if it exists
    async fn copy(&self, source: &S3Location, destination: &S3Location) -> Result<()>;

    async fn get(&self, location: &S3Location) -> Result<Vec<u8>>;

    async fn put(&self, location: &S3Location, data: Vec<u8>, content_type: Option<&str>) -> Result<()>;

    async fn exists(&self, location: &S3Location) -> Result<bool> {
        Ok(self.head(location).await?.is_some())
    }
}
