//! Registration status reconciler
//!
//! For registrations that have been batched, asks DLCS how the batch and
//! the image fared and replaces the registration's `dlcs` record with the
//! answer. The image is only checked when the batch did not succeed, and
//! its error only fetched when the image did not succeed either.

use crate::api::dlcs::image_id;
use crate::api::ImageBatchApi;
use crate::error::Result;
use crate::models::registration::BATCH_ID_PATH;
use crate::models::{DlcsRegistration, Registration, RegistrationStatus};
use crate::store::{DocumentQuery, IndexStore, IndexStoreExt};
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub checked: usize,
    pub batch_succeeded: usize,
    pub image_succeeded: usize,
    /// Miro ids still not successful after this run
    pub failed: Vec<String>,
}

pub struct RegistrationStatusReconciler<'a> {
    store: &'a dyn IndexStore,
    dlcs: &'a dyn ImageBatchApi,
    registrations_index: &'a str,
}

impl<'a> RegistrationStatusReconciler<'a> {
    pub fn new(store: &'a dyn IndexStore, dlcs: &'a dyn ImageBatchApi, registrations_index: &'a str) -> Self {
        Self {
            store,
            dlcs,
            registrations_index,
        }
    }

    /// Reconcile up to `limit` batched registrations.
    ///
    /// Registrations already known to be successful are skipped unless
    /// `recheck_successful` is set, so consecutive limited runs make progress.
    pub async fn update(&self, limit: usize, recheck_successful: bool) -> Result<StatusSummary> {
        let registrations: Vec<Registration> = self
            .store
            .iterate_records(self.registrations_index, DocumentQuery::exists(BATCH_ID_PATH))
            .try_filter(|registration: &Registration| {
                let done = registration
                    .dlcs
                    .as_ref()
                    .is_some_and(|dlcs| dlcs.status.image_successful());
                futures::future::ready(recheck_successful || !done)
            })
            .take(limit)
            .try_collect()
            .await?;

        let mut summary = StatusSummary::default();

        for mut registration in registrations {
            let Some(batch_id) = registration.batch_id().map(str::to_string) else {
                continue;
            };

            let dlcs = self.check(&registration.miro_id, batch_id).await;
            match &dlcs.status {
                RegistrationStatus::BatchSucceeded => summary.batch_succeeded += 1,
                RegistrationStatus::ImageSucceeded => summary.image_succeeded += 1,
                _ => summary.failed.push(registration.miro_id.clone()),
            }
            summary.checked += 1;

            registration.dlcs = Some(dlcs);
            self.store
                .put_record(self.registrations_index, &registration.miro_id, &registration)
                .await?;
        }

        info!(
            checked = summary.checked,
            batch_succeeded = summary.batch_succeeded,
            image_succeeded = summary.image_succeeded,
            failed = summary.failed.len(),
            "Updated registrations"
        );
        Ok(summary)
    }

    /// Ask DLCS about one registration. A failed check counts as "not
    /// successful" and is retried on the next run.
    async fn check(&self, miro_id: &str, batch_id: String) -> DlcsRegistration {
        let image_id = image_id(miro_id);

        let batch_successful = self
            .dlcs
            .check_batch_successful(&batch_id)
            .await
            .unwrap_or_else(|e| {
                warn!(miro_id, batch_id = %batch_id, error = %e, "Batch check failed");
                false
            });

        let image_successful = batch_successful
            || self
                .dlcs
                .check_image_successful(&image_id)
                .await
                .unwrap_or_else(|e| {
                    warn!(miro_id, image_id = %image_id, error = %e, "Image check failed");
                    false
                });

        let image_error = if image_successful {
            None
        } else {
            self.dlcs.get_image_error(&image_id).await.unwrap_or_else(|e| {
                warn!(miro_id, image_id = %image_id, error = %e, "Image error lookup failed");
                None
            })
        };

        debug!(miro_id, batch_successful, image_successful, "Checked registration");

        DlcsRegistration {
            batch_id,
            image_id: Some(image_id),
            status: RegistrationStatus::from_checks(batch_successful, image_successful, image_error),
        }
    }
}
