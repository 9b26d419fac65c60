//! Index snapshots on local disk
//!
//! A snapshot is a JSON-lines file with one [`Document`] per line. It lets an
//! operator carry an index between environments (e.g. from a laptop to the
//! box that runs the transfers).

use super::{Document, DocumentQuery, IndexStore};
use crate::error::{MigrationError, Result};
use futures::TryStreamExt;
use serde_jsonlines::JsonLinesWriter;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

/// Write every document in `index` to `path`.
///
/// Refuses to replace an existing snapshot unless `overwrite` is set. The
/// file is written under a temporary name and renamed into place, so an
/// interrupted save never leaves a truncated snapshot behind.
pub async fn save_index(
    store: &dyn IndexStore,
    index: &str,
    path: &Path,
    overwrite: bool,
) -> Result<u64> {
    if path.exists() && !overwrite {
        return Err(MigrationError::snapshot(format!(
            "'{}' already exists. Use --overwrite to replace it.",
            path.display()
        )));
    }

    if !store.index_exists(index).await? {
        return Err(MigrationError::snapshot(format!("Index '{}' does not exist", index)));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let partial = path.with_extension("jsonl.partial");
    let mut writer = JsonLinesWriter::new(BufWriter::new(File::create(&partial)?));
    let mut written = 0u64;

    let mut documents = store.iterate(index, DocumentQuery::All);
    while let Some(doc) = documents.try_next().await? {
        writer.write(&doc)?;
        written += 1;
    }
    writer.flush()?;
    drop(writer);

    fs::rename(&partial, path)?;

    info!(index, path = %path.display(), documents = written, "Saved index snapshot");
    Ok(written)
}

/// Load the snapshot at `path` into `target_index`.
///
/// An existing, non-empty target is only replaced when `overwrite` is set;
/// in that case it is dropped first so no stale documents survive.
pub async fn load_index(
    store: &dyn IndexStore,
    path: &Path,
    target_index: &str,
    overwrite: bool,
) -> Result<u64> {
    if !path.exists() {
        return Err(MigrationError::snapshot(format!(
            "No snapshot found at '{}'. Run save-index first.",
            path.display()
        )));
    }

    let existing = store.count(target_index).await?;
    if existing > 0 {
        if !overwrite {
            return Err(MigrationError::snapshot(format!(
                "Index '{}' already holds {} documents. Use --overwrite to replace it.",
                target_index, existing
            )));
        }
        debug!(index = target_index, existing, "Dropping index before load");
        store.delete_index(target_index).await?;
    }

    store.create_index_if_absent(target_index).await?;

    let mut read = 0u64;
    for doc in serde_jsonlines::json_lines(path)? {
        let doc: Document = doc?;
        store.put(target_index, &doc.id, &doc.body).await?;
        read += 1;
    }

    let actual = store.count(target_index).await?;
    if actual != read {
        return Err(MigrationError::CountMismatch {
            index: target_index.to_string(),
            expected: read,
            actual,
        });
    }

    info!(index = target_index, path = %path.display(), documents = read, "Loaded index snapshot");
    Ok(read)
}
