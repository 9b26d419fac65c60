//! Pipeline stages
//!
//! Each stage is one CLI command's worth of work. A stage reads the pending
//! records it needs from the index store, does at most one round-trip per
//! external concern per unit, and writes each unit's record back before
//! moving on. Stages never depend on another stage having run in the same
//! process.

pub mod chunks;
pub mod dlcs_batcher;
pub mod dlcs_status;
pub mod index_builder;
pub mod registrations;
pub mod transfer_package;
pub mod upload;

pub use dlcs_batcher::{BatchSummary, RegistrationBatcher};
pub use dlcs_status::{RegistrationStatusReconciler, StatusSummary};
pub use index_builder::{build_index, read_export, BuildOutcome};
pub use transfer_package::{TransferPackageBuilder, TransferSummary};
pub use upload::{ChunkReport, UploadOptions, UploadReconciler, UploadRun, UploadSummary};
