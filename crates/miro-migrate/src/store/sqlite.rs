//! SQLite-backed document store
//!
//! Documents are kept as JSON text in a single `documents` table keyed by
//! `(index_name, doc_id)`; field queries use SQLite's `json_extract`.

use super::{Document, DocumentQuery, IndexStore};
use crate::error::{MigrationError, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::debug;

const SELECT_ALL: &str = r#"
    SELECT doc_id, body FROM documents
    WHERE index_name = ?1
    ORDER BY rowid
"#;

const SELECT_MISSING: &str = r#"
    SELECT doc_id, body FROM documents
    WHERE index_name = ?1 AND json_extract(body, ?2) IS NULL
    ORDER BY rowid
"#;

const SELECT_EXISTS: &str = r#"
    SELECT doc_id, body FROM documents
    WHERE index_name = ?1 AND json_extract(body, ?2) IS NOT NULL
    ORDER BY rowid
"#;

/// Document store on a local SQLite database
#[derive(Clone)]
pub struct SqliteIndexStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    doc_id: String,
    body: String,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document> {
        let body = serde_json::from_str(&self.body)?;
        Ok(Document {
            id: self.doc_id,
            body,
        })
    }
}

impl SqliteIndexStore {
    /// Open (creating if necessary) the database file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        debug!(path = %path.display(), "Opening index store");

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database, used by tests
    pub async fn in_memory() -> Result<Self> {
        // A single long-lived connection: every new in-memory connection is
        // a fresh, empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn create_index_if_absent(&self, index: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO indices (name) VALUES (?1)")
            .bind(index)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM indices WHERE name = ?1")
            .bind(index)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM documents WHERE index_name = ?1")
            .bind(index)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM indices WHERE name = ?1")
            .bind(index)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(index, removed, "Deleted index");
        Ok(())
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT doc_id, body FROM documents WHERE index_name = ?1 AND doc_id = ?2",
        )
        .bind(index)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DocumentRow::into_document).transpose()
    }

    async fn put(&self, index: &str, id: &str, body: &Value) -> Result<()> {
        if id.is_empty() {
            return Err(MigrationError::store(format!(
                "Refusing to write a document with an empty id to '{}'",
                index
            )));
        }

        let body = serde_json::to_string(body)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO indices (name) VALUES (?1)")
            .bind(index)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO documents (index_name, doc_id, body, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(index_name, doc_id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(index)
        .bind(id)
        .bind(body)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE index_name = ?1")
            .bind(index)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    fn iterate<'a>(
        &'a self,
        index: &'a str,
        query: DocumentQuery,
    ) -> BoxStream<'a, Result<Document>> {
        let rows = match query {
            DocumentQuery::All => sqlx::query_as::<_, DocumentRow>(SELECT_ALL)
                .bind(index)
                .fetch(&self.pool),
            DocumentQuery::Missing(path) => sqlx::query_as::<_, DocumentRow>(SELECT_MISSING)
                .bind(index)
                .bind(path)
                .fetch(&self.pool),
            DocumentQuery::Exists(path) => sqlx::query_as::<_, DocumentRow>(SELECT_EXISTS)
                .bind(index)
                .bind(path)
                .fetch(&self.pool),
        };

        rows.map(|row| row.map_err(MigrationError::from).and_then(DocumentRow::into_document))
            .boxed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::IndexStoreExt;
    use futures::TryStreamExt;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_is_full_overwrite() {
        let store = SqliteIndexStore::in_memory().await.unwrap();

        store
            .put("registrations", "A0000001", &json!({"miro_id": "A0000001", "dlcs": {"batch_id": "b1"}}))
            .await
            .unwrap();
        store
            .put("registrations", "A0000001", &json!({"miro_id": "A0000001"}))
            .await
            .unwrap();

        let doc = store.get("registrations", "A0000001").await.unwrap().unwrap();
        assert_eq!(doc.body, json!({"miro_id": "A0000001"}));
        assert_eq!(store.count("registrations").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_absent() {
        let store = SqliteIndexStore::in_memory().await.unwrap();
        assert!(store.get("chunks", "nope").await.unwrap().is_none());
        assert_eq!(store.count("chunks").await.unwrap(), 0);
        assert!(!store.index_exists("chunks").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_and_delete_index() {
        let store = SqliteIndexStore::in_memory().await.unwrap();

        store.create_index_if_absent("transfers").await.unwrap();
        store.create_index_if_absent("transfers").await.unwrap();
        assert!(store.index_exists("transfers").await.unwrap());

        store.put("transfers", "c_1", &json!({})).await.unwrap();
        store.delete_index("transfers").await.unwrap();

        assert!(!store.index_exists("transfers").await.unwrap());
        assert_eq!(store.count("transfers").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_iterate_queries() {
        let store = SqliteIndexStore::in_memory().await.unwrap();

        store.put("r", "1", &json!({"dlcs": {"batch_id": "b"}})).await.unwrap();
        store.put("r", "2", &json!({"dlcs": null})).await.unwrap();
        store.put("r", "3", &json!({})).await.unwrap();

        let all: Vec<Document> = store.iterate("r", DocumentQuery::All).try_collect().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);

        let missing: Vec<Document> = store
            .iterate("r", DocumentQuery::missing("$.dlcs.batch_id"))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(missing.len(), 2);

        let present: Vec<Document> = store
            .iterate("r", DocumentQuery::exists("$.dlcs.batch_id"))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(present.len(), 1);
        assert_eq!(present[0].id, "1");
    }

    #[tokio::test]
    async fn test_overwrite_keeps_iteration_position() {
        let store = SqliteIndexStore::in_memory().await.unwrap();
        for id in ["a", "b", "c"] {
            store.put("idx", id, &json!({"n": 0})).await.unwrap();
        }
        store.put("idx", "a", &json!({"n": 1})).await.unwrap();

        let ids: Vec<String> = store
            .iterate("idx", DocumentQuery::All)
            .map_ok(|d| d.id)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_typed_records() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Sample {
            name: String,
        }

        let store = SqliteIndexStore::in_memory().await.unwrap();
        let sample = Sample {
            name: "L0055000".to_string(),
        };
        store.put_record("samples", "p", &sample).await.unwrap();

        let back: Option<Sample> = store.get_record("samples", "p").await.unwrap();
        assert_eq!(back, Some(sample));

        store.put("samples", "bad", &json!({"other": 1})).await.unwrap();
        let err = store.get_record::<Sample>("samples", "bad").await.unwrap_err();
        assert!(matches!(err, MigrationError::MalformedDocument { .. }));
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("indices.db");

        {
            let store = SqliteIndexStore::open(&path).await.unwrap();
            store.put("chunks", "c_1", &json!({"x": 1})).await.unwrap();
        }

        let reopened = SqliteIndexStore::open(&path).await.unwrap();
        assert_eq!(reopened.count("chunks").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let store = SqliteIndexStore::in_memory().await.unwrap();
        assert!(store.put("chunks", "", &json!({})).await.is_err());
    }
}
