//! Miro migration tool
//!
//! Moves legacy Miro images into the storage service and registers them with
//! DLCS, one restartable stage at a time.
//!
//! # Overview
//!
//! - **Indices**: build the pipeline's document indices from upstream exports
//!   (`create-*-index`) and carry them between machines (`save-index`,
//!   `load-index`)
//! - **Packaging**: build a BagIt tarball per chunk (`transfer-package-chunks`)
//! - **Upload**: hand packages to the storage service and track ingests and
//!   bags (`upload-transfer-packages`)
//! - **Registration**: queue images with DLCS and record the outcome
//!   (`dlcs-send-registrations`, `dlcs-update-registrations`)
//!
//! Every stage re-reads its pending work from the index store and writes each
//! unit's record back before moving on, so any command can be interrupted
//! and simply run again.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::MigrationConfig;
pub use error::{MigrationError, Result};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Miro migration - transfer Miro content into the storage service
#[derive(Parser, Debug)]
#[command(name = "miro-migrate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Index database path (defaults to {MIGRATION_DATA_DIR}/indices.db)
    #[arg(long, env = "MIGRATION_INDEX_DB", global = true)]
    pub index_db: Option<PathBuf>,

    /// Print the command reference as markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the sourcedata index from the catalogue export
    CreateSourcedataIndex {
        /// JSON-lines export (defaults to {data_dir}/sourcedata.jsonl)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Drop and rebuild the index
        #[arg(short, long)]
        overwrite: bool,
    },

    /// Build the files index from the source bucket listing
    CreateFilesIndex {
        /// JSON-lines export (defaults to {data_dir}/files.jsonl)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Drop and rebuild the index
        #[arg(short, long)]
        overwrite: bool,
    },

    /// Build the decisions index from the decisions export
    CreateDecisionsIndex {
        /// JSON-lines export (defaults to {data_dir}/decisions.jsonl)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Drop and rebuild the index
        #[arg(short, long)]
        overwrite: bool,
    },

    /// Group decisions into chunks
    CreateChunksIndex {
        /// Drop and rebuild the index
        #[arg(short, long)]
        overwrite: bool,
    },

    /// Pair catalogued images with their source files
    CreateRegistrationsIndex {
        /// Drop and rebuild the index
        #[arg(short, long)]
        overwrite: bool,
    },

    /// Save an index to a JSON-lines snapshot
    SaveIndex {
        /// Index to save
        #[arg(long)]
        index_name: String,

        /// Replace an existing snapshot
        #[arg(short, long)]
        overwrite: bool,
    },

    /// Load an index from its JSON-lines snapshot
    LoadIndex {
        /// Index whose snapshot to load
        #[arg(long)]
        index_name: String,

        /// Index to load into (defaults to --index-name)
        #[arg(long)]
        target_index_name: Option<String>,

        /// Replace a populated target index
        #[arg(short, long)]
        overwrite: bool,
    },

    /// Build and upload a transfer package for every chunk
    TransferPackageChunks,

    /// Copy transfer packages to the storage service and record ingests and bags
    UploadTransferPackages {
        /// Report existing uploads without copying anything
        #[arg(short, long)]
        skip_upload: bool,

        /// Only process this chunk
        #[arg(long)]
        chunk_id: Option<String>,

        /// Maximum number of chunks to process
        #[arg(long, default_value = "100")]
        limit: usize,

        /// Copy packages again even when a copy is recorded
        #[arg(short, long)]
        overwrite: bool,
    },

    /// Queue pending registrations with DLCS
    DlcsSendRegistrations {
        /// Maximum number of batches to submit
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// Record DLCS outcomes for batched registrations
    DlcsUpdateRegistrations {
        /// Maximum number of registrations to check
        #[arg(long, default_value = "5")]
        limit: usize,

        /// Also re-check registrations already recorded as successful
        #[arg(long)]
        recheck_successful: bool,
    },

    /// Show document counts for every pipeline index
    IndexStatus,
}
