//! Count-guarded index builds
//!
//! Every `create-*-index` command knows up front how many documents the
//! index should hold. After writing, the stored count is compared against
//! that number; a mismatch fails the build unless the operator asked for an
//! overwrite.

use crate::error::{MigrationError, Result};
use crate::models::SourceRecord;
use crate::store::IndexStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// What an index build did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The index already held the expected number of documents
    AlreadyPopulated { count: u64 },
    Built { written: u64, count: u64 },
}

/// Write `documents` into `index`, checking the final count against `expected`.
///
/// Without `overwrite`, an index that already holds exactly `expected`
/// documents is left alone. With `overwrite`, the index is dropped first and
/// a count mismatch is only logged.
pub async fn build_index<I>(
    store: &dyn IndexStore,
    index: &str,
    expected: u64,
    documents: I,
    overwrite: bool,
) -> Result<BuildOutcome>
where
    I: IntoIterator<Item = (String, serde_json::Value)>,
{
    if overwrite {
        if store.index_exists(index).await? {
            info!(index, "Dropping index before rebuild");
            store.delete_index(index).await?;
        }
    } else if store.index_exists(index).await? {
        let count = store.count(index).await?;
        if count == expected {
            info!(index, count, "Index already populated, skipping");
            return Ok(BuildOutcome::AlreadyPopulated { count });
        }
        debug!(index, count, expected, "Index partially populated, filling in");
    }

    store.create_index_if_absent(index).await?;

    let mut written = 0u64;
    for (id, body) in documents {
        store.put(index, &id, &body).await?;
        written += 1;
    }

    let count = store.count(index).await?;
    if count != expected {
        if !overwrite {
            return Err(MigrationError::CountMismatch {
                index: index.to_string(),
                expected,
                actual: count,
            });
        }
        warn!(index, count, expected, "Document count differs from expected");
    }

    info!(index, written, count, "Built index");
    Ok(BuildOutcome::Built { written, count })
}

/// Read a JSON-lines export into `(document id, body)` pairs
pub fn read_export<T>(path: &Path) -> Result<Vec<(String, serde_json::Value)>>
where
    T: DeserializeOwned + Serialize + SourceRecord,
{
    if !path.exists() {
        return Err(MigrationError::config(format!(
            "No export found at '{}'; pass --source or set MIGRATION_DATA_DIR",
            path.display()
        )));
    }

    let source = path.display().to_string();
    let mut documents = Vec::new();

    for (line, record) in serde_jsonlines::json_lines(path)?.enumerate() {
        let record: T = record.map_err(|e| MigrationError::malformed(&source, &format!("line {}", line + 1), e))?;
        let body = serde_json::to_value(&record)?;
        documents.push((record.record_id().to_string(), body));
    }

    debug!(path = %source, records = documents.len(), "Read export");
    Ok(documents)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::Decision;
    use crate::store::SqliteIndexStore;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn docs(ids: &[&str]) -> Vec<(String, serde_json::Value)> {
        ids.iter()
            .map(|id| (id.to_string(), json!({"id": id})))
            .collect()
    }

    #[tokio::test]
    async fn test_build_and_skip_when_populated() {
        let store = SqliteIndexStore::in_memory().await.unwrap();

        let outcome = build_index(&store, "sourcedata", 3, docs(&["a", "b", "c"]), false)
            .await
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Built { written: 3, count: 3 });

        let outcome = build_index(&store, "sourcedata", 3, docs(&["x"]), false).await.unwrap();
        assert_eq!(outcome, BuildOutcome::AlreadyPopulated { count: 3 });
        assert!(store.get("sourcedata", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_count_guard_fails_without_overwrite() {
        let store = SqliteIndexStore::in_memory().await.unwrap();

        // Duplicate ids collapse, so fewer documents land than expected
        let err = build_index(&store, "files", 3, docs(&["a", "a", "b"]), false)
            .await
            .unwrap_err();
        match err {
            MigrationError::CountMismatch { expected, actual, .. } => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_overwrite_rebuilds_and_tolerates_mismatch() {
        let store = SqliteIndexStore::in_memory().await.unwrap();
        build_index(&store, "files", 2, docs(&["old", "stale"]), false).await.unwrap();

        let outcome = build_index(&store, "files", 3, docs(&["a", "a", "b"]), true)
            .await
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Built { written: 3, count: 2 });
        assert!(store.get("files", "old").await.unwrap().is_none());
    }

    #[test]
    fn test_read_export() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"s3_key": "A/A0000001.jpg", "miro_id": "A0000001", "destination": "A"}}"#).unwrap();
        writeln!(file, r#"{{"s3_key": "A/A0000002.jpg", "skip": true}}"#).unwrap();

        let documents = read_export::<Decision>(file.path()).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].0, "A/A0000001.jpg");
        assert_eq!(documents[1].1["skip"], json!(true));
    }

    #[test]
    fn test_read_export_reports_bad_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"s3_key": "ok"}}"#).unwrap();
        writeln!(file, r#"{{"miro_id": "no key"}}"#).unwrap();

        let err = read_export::<Decision>(file.path()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_read_export_missing_file() {
        let err = read_export::<Decision>(Path::new("/nonexistent/decisions.jsonl")).unwrap_err();
        assert!(matches!(err, MigrationError::Config(_)));
    }
}
