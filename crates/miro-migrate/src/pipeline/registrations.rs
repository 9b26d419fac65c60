//! Registration gathering
//!
//! One registration per catalogued Miro image that has a transferable source
//! object. When several objects claim the same Miro id, the first by key wins.

use crate::error::Result;
use crate::models::{Decision, Registration, SourceData};
use crate::store::{DocumentQuery, IndexStore, IndexStoreExt};
use futures::TryStreamExt;
use std::collections::BTreeMap;
use tracing::debug;

pub async fn gather_registrations(
    store: &dyn IndexStore,
    sourcedata_index: &str,
    decisions_index: &str,
) -> Result<Vec<Registration>> {
    let mut decisions: Vec<Decision> = store
        .iterate_records(decisions_index, DocumentQuery::All)
        .try_collect()
        .await?;
    decisions.sort_by(|a, b| a.s3_key.cmp(&b.s3_key));

    let mut files_by_miro_id: BTreeMap<String, String> = BTreeMap::new();
    for decision in decisions.into_iter().filter(|d| !d.skip) {
        if let Some(miro_id) = decision.miro_id {
            files_by_miro_id.entry(miro_id).or_insert(decision.s3_key);
        }
    }

    let sourcedata: Vec<SourceData> = store
        .iterate_records(sourcedata_index, DocumentQuery::All)
        .try_collect()
        .await?;

    let registrations: Vec<Registration> = sourcedata
        .iter()
        .filter_map(|record| {
            files_by_miro_id
                .get(&record.id)
                .map(|file_id| Registration::new(record.id.clone(), file_id.clone()))
        })
        .collect();

    debug!(
        sourcedata = sourcedata.len(),
        registrations = registrations.len(),
        "Gathered registrations"
    );
    Ok(registrations)
}
