//! Index-backed record store
//!
//! Pipeline state lives in named document collections ("indices"). Every
//! stage re-reads the records it needs at the start of each unit of work and
//! writes them back as full documents, which is what makes a run safe to kill
//! and restart.
//!
//! `put` is last-write-wins with no concurrency check: one operator runs the
//! tool against an environment at a time.

pub mod snapshot;
pub mod sqlite;

pub use sqlite::SqliteIndexStore;

use crate::error::{MigrationError, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored document: its id within the index and its JSON body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub body: Value,
}

impl Document {
    /// Deserialize the body as a typed record
    pub fn into_record<T: DeserializeOwned>(self, index: &str) -> Result<T> {
        serde_json::from_value(self.body).map_err(|e| MigrationError::malformed(index, &self.id, e))
    }
}

/// Filter applied when iterating an index.
///
/// Paths are SQLite JSON paths such as `$.dlcs.batch_id`. A field that is
/// absent or `null` counts as missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentQuery {
    All,
    Missing(String),
    Exists(String),
}

impl DocumentQuery {
    pub fn missing(path: impl Into<String>) -> Self {
        Self::Missing(path.into())
    }

    pub fn exists(path: impl Into<String>) -> Self {
        Self::Exists(path.into())
    }
}

/// Document store operations the pipeline builds on
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Create the named index; a no-op when it already exists
    async fn create_index_if_absent(&self, index: &str) -> Result<()>;

    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Drop the index and every document in it
    async fn delete_index(&self, index: &str) -> Result<()>;

    async fn get(&self, index: &str, id: &str) -> Result<Option<Document>>;

    /// Write `body` as the whole document for `id`, creating the index if needed
    async fn put(&self, index: &str, id: &str, body: &Value) -> Result<()>;

    async fn count(&self, index: &str) -> Result<u64>;

    /// Lazily stream matching documents.
    ///
    /// The stream is finite; re-issuing the query restarts it. Ordering is
    /// insertion order for this store but callers must not rely on it being
    /// stable across runs.
    fn iterate<'a>(&'a self, index: &'a str, query: DocumentQuery)
        -> BoxStream<'a, Result<Document>>;
}

/// Typed helpers over [`IndexStore`]
#[async_trait]
pub trait IndexStoreExt: IndexStore {
    async fn get_record<T>(&self, index: &str, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.get(index, id).await? {
            Some(doc) => doc.into_record(index).map(Some),
            None => Ok(None),
        }
    }

    async fn put_record<T>(&self, index: &str, id: &str, record: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let body = serde_json::to_value(record)?;
        self.put(index, id, &body).await
    }

    fn iterate_records<'a, T>(
        &'a self,
        index: &'a str,
        query: DocumentQuery,
    ) -> BoxStream<'a, Result<T>>
    where
        T: DeserializeOwned + Send + 'a,
    {
        self.iterate(index, query)
            .map(move |doc| doc.and_then(|d| d.into_record(index)))
            .boxed()
    }
}

impl<S: IndexStore + ?Sized> IndexStoreExt for S {}
