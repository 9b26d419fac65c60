//! Common types used across the migration toolkit

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A bucket/key pair in object storage.
///
/// Serialized as `{"s3_bucket": ..., "s3_key": ...}` so that the records in
/// the document store read the same as the operator-facing output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct S3Location {
    pub s3_bucket: String,
    pub s3_key: String,
}

impl S3Location {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            s3_bucket: bucket.into(),
            s3_key: key.into(),
        }
    }

    /// Final path segment of the key
    pub fn file_name(&self) -> &str {
        self.s3_key.rsplit('/').next().unwrap_or(&self.s3_key)
    }
}

impl std::fmt::Display for S3Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.s3_bucket, self.s3_key)
    }
}

impl FromStr for S3Location {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("s3://")
            .ok_or_else(|| CommonError::InvalidLocation(s.to_string()))?;

        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                Ok(Self::new(bucket, key))
            },
            _ => Err(CommonError::InvalidLocation(s.to_string())),
        }
    }
}
