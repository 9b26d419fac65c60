//! Typed pipeline records
//!
//! Every record kind the pipeline persists. Optional state is spelled out
//! with `Option` and enums so a stored document can only describe states the
//! pipeline can actually reach.

pub mod chunk;
pub mod registration;
pub mod sources;
pub mod transfer;

pub use chunk::{Chunk, PackageUpload, TransferPackage};
pub use registration::{DlcsRegistration, Registration, RegistrationStatus};
pub use sources::{Decision, MiroFile, SourceData, SourceRecord};
pub use transfer::{Bag, BagInfo, Ingest, IngestStatus, StorageServiceState, TransferRecord, UploadState};
