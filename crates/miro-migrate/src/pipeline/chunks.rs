//! Chunk gathering
//!
//! Decisions that are not skipped are grouped by destination. Within a group
//! the source keys are sorted and cut into chunks of `chunk_size`, numbered
//! from 1. The same decisions therefore always produce the same chunk ids.
//!
//! Package names and storage service bags are keyed by a chunk's external
//! identifier, so two groups that differ only in spaces versus underscores
//! are rejected rather than left to overwrite each other's packages.

use crate::error::{MigrationError, Result};
use crate::models::{Chunk, Decision};
use crate::store::{DocumentQuery, IndexStore, IndexStoreExt};
use futures::TryStreamExt;
use miro_common::chunked;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub async fn gather_chunks(
    store: &dyn IndexStore,
    decisions_index: &str,
    chunk_size: usize,
) -> Result<Vec<Chunk>> {
    let decisions: Vec<Decision> = store
        .iterate_records(decisions_index, DocumentQuery::All)
        .try_collect()
        .await?;

    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for decision in &decisions {
        if let Some(group) = decision.transfer_group() {
            groups
                .entry(group.to_string())
                .or_default()
                .push(decision.s3_key.clone());
        }
    }

    let mut chunks = Vec::new();
    for (group_name, mut keys) in groups {
        keys.sort();
        keys.dedup();

        for (position, s3_keys) in chunked(keys, chunk_size).enumerate() {
            chunks.push(Chunk::new(group_name.clone(), position as u32 + 1, s3_keys));
        }
    }

    check_unique_identifiers(&chunks)?;

    debug!(decisions = decisions.len(), chunks = chunks.len(), "Gathered chunks");
    Ok(chunks)
}

fn check_unique_identifiers(chunks: &[Chunk]) -> Result<()> {
    let mut seen: HashMap<String, String> = HashMap::with_capacity(chunks.len());
    for chunk in chunks {
        let chunk_id = chunk.chunk_id();
        if let Some(first) = seen.insert(chunk.external_identifier(), chunk_id.clone()) {
            return Err(MigrationError::DuplicateIdentifier {
                identifier: chunk.external_identifier(),
                first,
                second: chunk_id,
            });
        }
    }
    Ok(())
}
