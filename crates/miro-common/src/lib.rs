//! Miro Migration Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the migration toolkit.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and its result alias
//! - **Logging**: tracing subscriber setup shared by every binary
//! - **Types**: object-storage locations used by the pipeline records
//! - **Iteration**: order-preserving fixed-size grouping
//!
//! # Example
//!
//! ```no_run
//! use miro_common::types::S3Location;
//!
//! fn main() -> miro_common::Result<()> {
//!     let location: S3Location = "s3://wellcomecollection-miro/A0000001.jpg".parse()?;
//!     println!("Package lives at {}", location);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod iter;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use iter::chunked;
pub use types::S3Location;
