//! Upload reconciler
//!
//! Moves each chunk's transfer package into the storage service's handoff
//! bucket and folds what the storage service knows about it into the
//! chunk's transfer record. Copying is the only write the reconciler makes
//! outside the index store; ingest and bag state are only ever read.

use crate::api::StorageService;
use crate::config::{IndexNames, TransferConfig};
use crate::error::{MigrationError, Result};
use crate::models::{Chunk, StorageServiceState, TransferRecord, UploadState};
use crate::storage::ObjectStore;
use crate::store::{DocumentQuery, IndexStore, IndexStoreExt};
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use miro_common::S3Location;
use tracing::{debug, error, info, warn};

/// Options from the `upload-transfer-packages` command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Never copy; only report what is already there
    pub skip_upload: bool,
    /// Process only this chunk
    pub chunk_id: Option<String>,
    /// Maximum number of chunks to process
    pub limit: usize,
    /// Copy again even when a copy is recorded
    pub overwrite: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            skip_upload: false,
            chunk_id: None,
            limit: 100,
            overwrite: false,
        }
    }
}

/// What happened to the package copy for one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Copied during this run
    Copied(S3Location),
    /// Already in the handoff bucket
    Found(S3Location),
    /// Not copied (upload skipped, or the copy failed)
    Missing,
}

/// Per-chunk result of a reconcile run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport {
    pub chunk_id: String,
    pub copy: CopyOutcome,
    pub storage_service: StorageServiceState,
    /// Set when the chunk could not be reconciled
    pub error: Option<String>,
}

impl ChunkReport {
    pub fn has_bag(&self) -> bool {
        self.storage_service.bag().is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub reports: Vec<ChunkReport>,
}

impl UploadSummary {
    /// Number of chunks actually processed
    pub fn attempted(&self) -> usize {
        self.reports.len()
    }

    pub fn bags_found(&self) -> usize {
        self.reports.iter().filter(|r| r.has_bag()).count()
    }

    pub fn missing_bags(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| !r.has_bag())
            .map(|r| r.chunk_id.as_str())
            .collect()
    }
}

/// Result of a reconcile run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRun {
    /// `--chunk-id` named a chunk that does not exist; nothing was touched
    UnknownChunk(String),
    Completed(UploadSummary),
}

pub struct UploadReconciler<'a> {
    store: &'a dyn IndexStore,
    objects: &'a dyn ObjectStore,
    storage_service: &'a dyn StorageService,
    indices: &'a IndexNames,
    transfer: &'a TransferConfig,
    space: &'a str,
}

impl<'a> UploadReconciler<'a> {
    pub fn new(
        store: &'a dyn IndexStore,
        objects: &'a dyn ObjectStore,
        storage_service: &'a dyn StorageService,
        indices: &'a IndexNames,
        transfer: &'a TransferConfig,
        space: &'a str,
    ) -> Self {
        Self {
            store,
            objects,
            storage_service,
            indices,
            transfer,
            space,
        }
    }

    /// Reconcile the selected chunks, handing each report to `on_report` as
    /// soon as its chunk is done
    pub async fn run<F>(&self, options: &UploadOptions, mut on_report: F) -> Result<UploadRun>
    where
        F: FnMut(&ChunkReport),
    {
        let chunks: Vec<Chunk> = match &options.chunk_id {
            Some(chunk_id) => match self.store.get_record(&self.indices.chunks, chunk_id).await? {
                Some(chunk) => vec![chunk],
                None => return Ok(UploadRun::UnknownChunk(chunk_id.clone())),
            },
            None => {
                self.store
                    .iterate_records(&self.indices.chunks, DocumentQuery::All)
                    .take(options.limit)
                    .try_collect()
                    .await?
            }
        };

        self.store.create_index_if_absent(&self.indices.transfers).await?;

        let mut summary = UploadSummary::default();
        for chunk in &chunks {
            let chunk_id = chunk.chunk_id();
            debug!(chunk_id = %chunk_id, "Reconciling chunk");

            let report = match self.reconcile(chunk, options).await {
                Ok(report) => report,
                Err(e) => {
                    error!(chunk_id = %chunk_id, error = %e, "Failed to reconcile chunk");
                    ChunkReport {
                        chunk_id,
                        copy: CopyOutcome::Missing,
                        storage_service: StorageServiceState::NotFound,
                        error: Some(e.to_string()),
                    }
                }
            };
            on_report(&report);
            summary.reports.push(report);
        }

        info!(
            attempted = summary.attempted(),
            bags_found = summary.bags_found(),
            "Reconciled transfer packages"
        );
        Ok(UploadRun::Completed(summary))
    }

    /// Bring one chunk's transfer record up to date
    pub async fn reconcile(&self, chunk: &Chunk, options: &UploadOptions) -> Result<ChunkReport> {
        let chunk_id = chunk.chunk_id();

        let existing: Option<TransferRecord> = self
            .store
            .get_record::<TransferRecord>(&self.indices.transfers, &chunk_id)
            .await?
            .filter(|record| !record.is_empty());

        if let Some(record) = existing.as_ref().filter(|r| r.state() == UploadState::Bagged) {
            debug!(chunk_id = %chunk_id, "Already bagged");
            return Ok(ChunkReport {
                chunk_id,
                copy: record
                    .upload_transfer
                    .clone()
                    .map_or(CopyOutcome::Missing, CopyOutcome::Found),
                storage_service: record.storage_service.clone(),
                error: None,
            });
        }

        let recorded = match existing.as_ref().and_then(|r| r.upload_transfer.clone()) {
            Some(location) => Some(location),
            None => self.find_previous_copy(chunk).await?,
        };

        let copy = if (recorded.is_none() || options.overwrite) && !options.skip_upload {
            let location = self.copy_transfer_package(chunk).await?;
            info!(chunk_id = %chunk_id, location = %location, "Copied transfer package");
            CopyOutcome::Copied(location)
        } else {
            recorded.map_or(CopyOutcome::Missing, CopyOutcome::Found)
        };

        let upload_transfer = match &copy {
            CopyOutcome::Copied(location) | CopyOutcome::Found(location) => Some(location.clone()),
            CopyOutcome::Missing => None,
        };

        let storage_service = self.lookup_storage_service(chunk).await;

        let changed = existing.as_ref().is_none_or(|record| {
            record.upload_transfer != upload_transfer || record.storage_service != storage_service
        });
        let record = TransferRecord {
            chunk_id: chunk_id.clone(),
            upload_transfer,
            storage_service: storage_service.clone(),
            updated_at: Utc::now(),
        };
        if changed {
            self.store
                .put_record(&self.indices.transfers, &chunk_id, &record)
                .await?;
        }

        Ok(ChunkReport {
            chunk_id,
            copy,
            storage_service,
            error: None,
        })
    }

    /// Where a chunk's package lands in the handoff bucket.
    ///
    /// Keyed by the whole external identifier: groups may share their last
    /// path segment, so the package's file name alone is not unique.
    pub fn handoff_location(&self, chunk: &Chunk) -> S3Location {
        let file_name = format!("{}.tar.gz", chunk.external_identifier());
        let prefix = self.transfer.upload_prefix.trim_matches('/');
        let key = if prefix.is_empty() {
            file_name
        } else {
            format!("{}/{}", prefix, file_name)
        };
        S3Location::new(self.transfer.upload_bucket.clone(), key)
    }

    /// A copy left by a run that stopped before recording it
    async fn find_previous_copy(&self, chunk: &Chunk) -> Result<Option<S3Location>> {
        if chunk.transfer_package.is_none() {
            return Ok(None);
        }
        let location = self.handoff_location(chunk);
        if self.objects.exists(&location).await? {
            debug!(chunk_id = %chunk.chunk_id(), location = %location, "Found unrecorded copy");
            Ok(Some(location))
        } else {
            Ok(None)
        }
    }

    async fn copy_transfer_package(&self, chunk: &Chunk) -> Result<S3Location> {
        let package = chunk
            .transfer_package
            .as_ref()
            .filter(|_| chunk.is_uploaded())
            .ok_or_else(|| {
                MigrationError::verification(
                    chunk.chunk_id(),
                    "no uploaded transfer package; run transfer-package-chunks first",
                )
            })?;

        let destination = self.handoff_location(chunk);
        self.objects.copy(&package.location, &destination).await?;
        Ok(destination)
    }

    /// Ingest and bag state for a chunk. Lookup failures are logged and read
    /// as "not there yet" so the next run asks again.
    async fn lookup_storage_service(&self, chunk: &Chunk) -> StorageServiceState {
        let chunk_id = chunk.chunk_id();
        let external_identifier = chunk.external_identifier();

        let ingest = match self
            .storage_service
            .find_ingest(self.space, &external_identifier)
            .await
        {
            Ok(ingest) => ingest,
            Err(e) => {
                warn!(chunk_id = %chunk_id, error = %e, "Ingest lookup failed");
                None
            }
        };

        let bag = match &ingest {
            Some(ingest) if ingest.succeeded() => {
                match self.storage_service.get_bag(self.space, &external_identifier).await {
                    Ok(bag) => bag,
                    Err(e) => {
                        warn!(chunk_id = %chunk_id, error = %e, "Bag lookup failed");
                        None
                    }
                }
            }
            _ => None,
        };

        StorageServiceState::from_lookups(ingest, bag)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{PackageUpload, TransferPackage};
    use crate::store::SqliteIndexStore;
    use crate::test_helpers::{FakeStorageService, MemoryObjectStore};

    struct Fixture {
        store: SqliteIndexStore,
        objects: MemoryObjectStore,
        storage_service: FakeStorageService,
        indices: IndexNames,
        transfer: TransferConfig,
    }

    impl Fixture {
        async fn new() -> Self {
            Self {
                store: SqliteIndexStore::in_memory().await.unwrap(),
                objects: MemoryObjectStore::default(),
                storage_service: FakeStorageService::default(),
                indices: IndexNames::default(),
                transfer: TransferConfig {
                    source_bucket: "miro-source".to_string(),
                    transfer_bucket: "miro-transfer".to_string(),
                    transfer_prefix: "transfer_packages".to_string(),
                    upload_bucket: "ingests".to_string(),
                    upload_prefix: "miro".to_string(),
                },
            }
        }

        fn reconciler(&self) -> UploadReconciler<'_> {
            UploadReconciler::new(
                &self.store,
                &self.objects,
                &self.storage_service,
                &self.indices,
                &self.transfer,
                "miro",
            )
        }

        /// Store a chunk whose package is in the transfer bucket
        async fn add_packaged_chunk(&self, group: &str, index: u32) -> Chunk {
            let mut chunk = Chunk::new(group, index, vec![format!("{}/{}.jpg", group, index)]);
            let location = S3Location::new(
                "miro-transfer",
                format!("transfer_packages/{}.tar.gz", chunk.external_identifier()),
            );
            self.objects.insert(location.clone(), b"package".to_vec());
            chunk.transfer_package = Some(TransferPackage {
                upload: Some(PackageUpload {
                    uploaded_at: Utc::now(),
                    content_length: 7,
                    sha256: "ab".to_string(),
                }),
                ..TransferPackage::new(location)
            });
            self.store
                .put_record("chunks", &chunk.chunk_id(), &chunk)
                .await
                .unwrap();
            chunk
        }

        async fn run(&self, options: &UploadOptions) -> UploadSummary {
            match self.reconciler().run(options, |_| {}).await.unwrap() {
                UploadRun::Completed(summary) => summary,
                other => panic!("unexpected run: {other:?}"),
            }
        }

        async fn record(&self, chunk_id: &str) -> Option<TransferRecord> {
            self.store.get_record("transfers", chunk_id).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_first_run_copies_package() {
        let fx = Fixture::new().await;
        fx.add_packaged_chunk("A", 1).await;

        let summary = fx.run(&UploadOptions::default()).await;

        let handoff = S3Location::new("ingests", "miro/A_1.tar.gz");
        assert_eq!(summary.reports[0].copy, CopyOutcome::Copied(handoff.clone()));
        assert!(fx.objects.contains(&handoff));

        let record = fx.record("A_1").await.unwrap();
        assert_eq!(record.upload_transfer, Some(handoff));
        assert_eq!(record.state(), UploadState::PackageCopied);
        assert_eq!(summary.missing_bags(), vec!["A_1"]);
    }

    #[tokio::test]
    async fn test_bagged_chunk_is_not_copied_or_looked_up_again() {
        let fx = Fixture::new().await;
        fx.add_packaged_chunk("A", 1).await;
        fx.storage_service.store_bag("A_1");

        let first = fx.run(&UploadOptions::default()).await;
        assert_eq!(first.bags_found(), 1);
        assert_eq!(fx.objects.copies(), 1);
        let lookups = fx.storage_service.lookups();

        let second = fx.run(&UploadOptions::default()).await;
        assert_eq!(second.bags_found(), 1);
        assert_eq!(fx.objects.copies(), 1);
        assert_eq!(fx.storage_service.lookups(), lookups);
        assert!(matches!(second.reports[0].copy, CopyOutcome::Found(_)));
    }

    #[tokio::test]
    async fn test_resumes_without_copying_again() {
        let fx = Fixture::new().await;
        fx.add_packaged_chunk("A", 1).await;

        // First run copies; the storage service has not seen the package yet
        fx.run(&UploadOptions::default()).await;
        assert_eq!(fx.objects.copies(), 1);

        fx.storage_service.set_ingest("A_1", "processing");
        let summary = fx.run(&UploadOptions::default()).await;
        assert_eq!(fx.record("A_1").await.unwrap().state(), UploadState::IngestSubmitted);
        assert_eq!(summary.bags_found(), 0);

        fx.storage_service.store_bag("A_1");
        let summary = fx.run(&UploadOptions::default()).await;
        assert_eq!(fx.record("A_1").await.unwrap().state(), UploadState::Bagged);
        assert_eq!(summary.bags_found(), 1);
        assert_eq!(fx.objects.copies(), 1);
    }

    #[tokio::test]
    async fn test_unrecorded_copy_is_adopted() {
        let fx = Fixture::new().await;
        fx.add_packaged_chunk("A", 1).await;
        let handoff = S3Location::new("ingests", "miro/A_1.tar.gz");
        fx.objects.insert(handoff.clone(), b"package".to_vec());

        let summary = fx.run(&UploadOptions::default()).await;
        assert_eq!(summary.reports[0].copy, CopyOutcome::Found(handoff));
        assert_eq!(fx.objects.copies(), 0);
    }

    #[tokio::test]
    async fn test_skip_upload_and_overwrite() {
        let fx = Fixture::new().await;
        fx.add_packaged_chunk("A", 1).await;

        let skip = UploadOptions {
            skip_upload: true,
            ..UploadOptions::default()
        };
        let summary = fx.run(&skip).await;
        assert_eq!(summary.reports[0].copy, CopyOutcome::Missing);
        assert_eq!(fx.objects.copies(), 0);

        fx.run(&UploadOptions::default()).await;
        assert_eq!(fx.objects.copies(), 1);

        let overwrite = UploadOptions {
            overwrite: true,
            ..UploadOptions::default()
        };
        fx.run(&overwrite).await;
        assert_eq!(fx.objects.copies(), 2);

        let both = UploadOptions {
            overwrite: true,
            skip_upload: true,
            ..UploadOptions::default()
        };
        fx.run(&both).await;
        assert_eq!(fx.objects.copies(), 2);
    }

    #[tokio::test]
    async fn test_limit_and_summary_count_processed_chunks() {
        let fx = Fixture::new().await;
        fx.add_packaged_chunk("A", 1).await;
        fx.add_packaged_chunk("A", 2).await;
        fx.add_packaged_chunk("A", 3).await;
        fx.storage_service.store_bag("A_2");

        let summary = fx
            .run(&UploadOptions {
                limit: 2,
                ..UploadOptions::default()
            })
            .await;
        assert_eq!(summary.attempted(), 2);
        assert_eq!(summary.bags_found(), 1);
        assert_eq!(summary.missing_bags(), vec!["A_1"]);

        // A limit larger than the number of chunks reports what was processed
        let summary = fx.run(&UploadOptions::default()).await;
        assert_eq!(summary.attempted(), 3);
        assert_eq!(summary.bags_found() + summary.missing_bags().len(), 3);
    }

    #[tokio::test]
    async fn test_single_chunk_and_unknown_chunk() {
        let fx = Fixture::new().await;
        fx.add_packaged_chunk("A", 1).await;
        fx.add_packaged_chunk("B", 1).await;

        let summary = fx
            .run(&UploadOptions {
                chunk_id: Some("B_1".to_string()),
                ..UploadOptions::default()
            })
            .await;
        assert_eq!(summary.attempted(), 1);
        assert_eq!(summary.reports[0].chunk_id, "B_1");

        let run = fx
            .reconciler()
            .run(
                &UploadOptions {
                    chunk_id: Some("nope_1".to_string()),
                    ..UploadOptions::default()
                },
                |_| panic!("no chunk should be reported"),
            )
            .await
            .unwrap();
        assert_eq!(run, UploadRun::UnknownChunk("nope_1".to_string()));
        assert!(fx.record("nope_1").await.is_none());
    }

    #[tokio::test]
    async fn test_unit_failures_do_not_stop_the_run() {
        let fx = Fixture::new().await;

        // No package yet: the copy cannot happen
        let unpackaged = Chunk::new("A", 1, vec!["A/1.jpg".to_string()]);
        fx.store
            .put_record("chunks", &unpackaged.chunk_id(), &unpackaged)
            .await
            .unwrap();
        fx.add_packaged_chunk("B", 1).await;
        fx.storage_service.fail_for("B_1");

        let summary = fx.run(&UploadOptions::default()).await;
        assert_eq!(summary.attempted(), 2);
        assert!(summary.reports[0].error.is_some());
        assert!(summary.reports[1].error.is_none());
        assert_eq!(summary.missing_bags(), vec!["A_1", "B_1"]);

        // The failed lookup is recorded as nothing found, with the copy kept
        let record = fx.record("B_1").await.unwrap();
        assert_eq!(record.state(), UploadState::PackageCopied);
    }

    #[tokio::test]
    async fn test_bag_ignored_until_ingest_succeeds() {
        let fx = Fixture::new().await;
        fx.add_packaged_chunk("A", 1).await;
        fx.storage_service.store_bag("A_1");
        fx.storage_service.set_ingest("A_1", "processing");

        let summary = fx.run(&UploadOptions::default()).await;
        assert_eq!(summary.bags_found(), 0);
        assert_eq!(fx.record("A_1").await.unwrap().state(), UploadState::IngestSubmitted);
    }

    #[tokio::test]
    async fn test_groups_sharing_a_final_segment_get_their_own_copies() {
        let fx = Fixture::new().await;
        fx.add_packaged_chunk("library/L0055000", 1).await;
        fx.add_packaged_chunk("iconographic/L0055000", 1).await;

        let summary = fx.run(&UploadOptions::default()).await;

        assert_eq!(fx.objects.copies(), 2);
        let library = S3Location::new("ingests", "miro/library/L0055000_1.tar.gz");
        let iconographic = S3Location::new("ingests", "miro/iconographic/L0055000_1.tar.gz");
        assert!(fx.objects.contains(&library));
        assert!(fx.objects.contains(&iconographic));

        assert!(summary
            .reports
            .iter()
            .all(|report| matches!(report.copy, CopyOutcome::Copied(_))));
        assert_eq!(
            fx.record("iconographic/L0055000_1").await.unwrap().upload_transfer,
            Some(iconographic)
        );
        assert_eq!(
            fx.record("library/L0055000_1").await.unwrap().upload_transfer,
            Some(library)
        );
    }

    #[tokio::test]
    async fn test_reports_are_handed_out_as_chunks_finish() {
        let fx = Fixture::new().await;
        fx.add_packaged_chunk("A", 1).await;
        fx.add_packaged_chunk("A", 2).await;
        fx.add_packaged_chunk("A", 3).await;

        let mut seen = Vec::new();
        let run = fx
            .reconciler()
            .run(&UploadOptions::default(), |report| {
                // Only the chunks reported so far have been copied
                assert_eq!(fx.objects.copies(), seen.len() + 1);
                seen.push(report.chunk_id.clone());
            })
            .await
            .unwrap();

        let UploadRun::Completed(summary) = run else {
            panic!("unexpected run: {run:?}");
        };
        let ids: Vec<String> = summary.reports.iter().map(|r| r.chunk_id.clone()).collect();
        assert_eq!(seen, ids);
        assert_eq!(seen, vec!["A_1", "A_2", "A_3"]);
    }
}
