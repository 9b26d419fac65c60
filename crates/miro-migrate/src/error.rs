//! Error types for the migration tool
//!
//! Errors are user-facing: each message says what went wrong and, where
//! there is one, what the operator can do about it.

use thiserror::Error;

/// Result type alias for migration operations
pub type Result<T> = std::result::Result<T, MigrationError>;

#[derive(Error, Debug)]
pub enum MigrationError {
    /// Index build wrote a different number of documents than the source holds
    #[error("Index '{index}' has {actual} documents but {expected} were expected. Re-run with --overwrite to rebuild it.")]
    CountMismatch {
        index: String,
        expected: u64,
        actual: u64,
    },

    /// Two chunks would share a package name in object storage
    #[error("Chunks '{first}' and '{second}' both map to the external identifier '{identifier}'. Rename one of the destination groups in the decisions export.")]
    DuplicateIdentifier {
        identifier: String,
        first: String,
        second: String,
    },

    /// Document store operation failed
    #[error("Index store error: {0}. Check the index database path (--index-db).")]
    Store(String),

    /// Stored document could not be read back as the expected record type
    #[error("Malformed document '{id}' in index '{index}': {message}")]
    MalformedDocument {
        index: String,
        id: String,
        message: String,
    },

    /// Snapshot file already exists or is missing
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Storage service returned a 5xx
    #[error("Unexpected error from storage service: {0}")]
    StorageServiceServer(String),

    /// Storage service rejected the request
    #[error("Storage service reported a user error: {0}")]
    StorageServiceUser(String),

    /// DLCS request failed
    #[error("DLCS error: {0}")]
    Dlcs(String),

    /// Object storage request failed
    #[error("Object storage error: {0}")]
    ObjectStorage(String),

    /// Declared upload is not where the record says it is
    #[error("Verification failed for {location}: {message}")]
    Verification { location: String, message: String },

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    #[error("Network request failed: {0}. Check your network connection and API URLs.")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] miro_common::CommonError),
}

impl MigrationError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    pub fn dlcs(msg: impl Into<String>) -> Self {
        Self::Dlcs(msg.into())
    }

    pub fn object_storage(msg: impl Into<String>) -> Self {
        Self::ObjectStorage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn verification(location: impl ToString, message: impl Into<String>) -> Self {
        Self::Verification {
            location: location.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(index: &str, id: &str, err: impl ToString) -> Self {
        Self::MalformedDocument {
            index: index.to_string(),
            id: id.to_string(),
            message: err.to_string(),
        }
    }
}
