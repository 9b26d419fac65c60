//! Registration batcher
//!
//! Sends registrations that have no batch id to DLCS in fixed-size batches
//! and stamps the returned batch id onto every registration in the batch.
//! Registrations with a batch id are never read here, so a re-run picks up
//! exactly where the previous one stopped.

use crate::api::ImageBatchApi;
use crate::error::Result;
use crate::models::registration::BATCH_ID_PATH;
use crate::models::{DlcsRegistration, Registration};
use crate::store::{DocumentQuery, IndexStore, IndexStoreExt};
use futures::{StreamExt, TryStreamExt};
use miro_common::chunked;
use tracing::{error, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Batch id and size of every batch submitted
    pub submitted: Vec<(String, usize)>,
    /// Batches DLCS refused; their registrations stay pending
    pub failed: usize,
}

impl BatchSummary {
    pub fn registrations(&self) -> usize {
        self.submitted.iter().map(|(_, size)| size).sum()
    }
}

pub struct RegistrationBatcher<'a> {
    store: &'a dyn IndexStore,
    dlcs: &'a dyn ImageBatchApi,
    registrations_index: &'a str,
    batch_size: usize,
}

impl<'a> RegistrationBatcher<'a> {
    pub fn new(
        store: &'a dyn IndexStore,
        dlcs: &'a dyn ImageBatchApi,
        registrations_index: &'a str,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            dlcs,
            registrations_index,
            batch_size: batch_size.max(1),
        }
    }

    /// Submit at most `limit` batches
    pub async fn send(&self, limit: usize) -> Result<BatchSummary> {
        let pending: Vec<Registration> = self
            .store
            .iterate_records(self.registrations_index, DocumentQuery::missing(BATCH_ID_PATH))
            .take(limit.saturating_mul(self.batch_size))
            .try_collect()
            .await?;

        let mut summary = BatchSummary::default();

        for (counter, batch) in chunked(pending, self.batch_size).enumerate() {
            let batch_id = match self.dlcs.register_batch(&batch).await {
                Ok(batch_id) => batch_id,
                Err(e) => {
                    error!(
                        batch = counter,
                        first_miro_id = %batch[0].miro_id,
                        error = %e,
                        "Failed to register batch"
                    );
                    summary.failed += 1;
                    continue;
                }
            };

            for mut registration in batch.iter().cloned() {
                registration.dlcs = Some(DlcsRegistration::submitted(batch_id.clone()));
                self.store
                    .put_record(self.registrations_index, &registration.miro_id, &registration)
                    .await?;
            }

            info!(batch = counter, batch_id = %batch_id, size = batch.len(), "Requested batch");
            summary.submitted.push((batch_id, batch.len()));
        }

        Ok(summary)
    }
}
