//! Error types shared across the migration toolkit

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Main error type for shared utilities
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid S3 location '{0}': expected 's3://bucket/key'")]
    InvalidLocation(String),
}
