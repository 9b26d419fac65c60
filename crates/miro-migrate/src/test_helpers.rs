//! In-memory stand-ins for the external services, for unit tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::api::{ImageBatchApi, StorageService};
use crate::error::{MigrationError, Result};
use crate::models::{Bag, BagInfo, Ingest, IngestStatus, Registration};
use crate::storage::ObjectStore;
use async_trait::async_trait;
use miro_common::S3Location;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Object store backed by a map, counting copies and puts
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<S3Location, Vec<u8>>>,
    copies: AtomicUsize,
    puts: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn insert(&self, location: S3Location, data: impl Into<Vec<u8>>) {
        self.objects.lock().unwrap().insert(location, data.into());
    }

    pub fn remove(&self, location: &S3Location) {
        self.objects.lock().unwrap().remove(location);
    }

    pub fn contains(&self, location: &S3Location) -> bool {
        self.objects.lock().unwrap().contains_key(location)
    }

    pub fn object(&self, location: &S3Location) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(location).cloned()
    }

    pub fn copies(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head(&self, location: &S3Location) -> Result<Option<u64>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(location)
            .map(|data| data.len() as u64))
    }

    async fn copy(&self, source: &S3Location, destination: &S3Location) -> Result<()> {
        let data = self
            .object(source)
            .ok_or_else(|| MigrationError::object_storage(format!("No such object: {}", source)))?;
        self.copies.fetch_add(1, Ordering::SeqCst);
        self.insert(destination.clone(), data);
        Ok(())
    }

    async fn get(&self, location: &S3Location) -> Result<Vec<u8>> {
        self.object(location)
            .ok_or_else(|| MigrationError::object_storage(format!("No such object: {}", location)))
    }

    async fn put(&self, location: &S3Location, data: Vec<u8>, _content_type: Option<&str>) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.insert(location.clone(), data);
        Ok(())
    }
}

/// Storage service with scripted ingests and bags, keyed by external identifier
#[derive(Default)]
pub struct FakeStorageService {
    ingests: Mutex<HashMap<String, Ingest>>,
    bags: Mutex<HashMap<String, Bag>>,
    failing: Mutex<HashSet<String>>,
    lookups: AtomicUsize,
}

impl FakeStorageService {
    pub fn set_ingest(&self, external_identifier: &str, status: &str) {
        self.ingests.lock().unwrap().insert(
            external_identifier.to_string(),
            Ingest {
                id: format!("ingest-{}", external_identifier),
                status: IngestStatus {
                    id: status.to_string(),
                },
            },
        );
    }

    /// Succeeded ingest plus its bag
    pub fn store_bag(&self, external_identifier: &str) {
        self.set_ingest(external_identifier, "succeeded");
        self.bags.lock().unwrap().insert(
            external_identifier.to_string(),
            Bag {
                id: format!("miro/{}", external_identifier),
                version: "v1".to_string(),
                info: BagInfo {
                    internal_sender_identifier: Some(external_identifier.to_string()),
                },
            },
        );
    }

    pub fn fail_for(&self, external_identifier: &str) {
        self.failing.lock().unwrap().insert(external_identifier.to_string());
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check(&self, external_identifier: &str) -> Result<()> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(external_identifier) {
            return Err(MigrationError::StorageServiceServer(
                "Unexpected error from storage service".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageService for FakeStorageService {
    async fn find_ingest(&self, _space: &str, external_identifier: &str) -> Result<Option<Ingest>> {
        self.check(external_identifier)?;
        Ok(self.ingests.lock().unwrap().get(external_identifier).cloned())
    }

    async fn get_bag(&self, _space: &str, external_identifier: &str) -> Result<Option<Bag>> {
        self.check(external_identifier)?;
        Ok(self.bags.lock().unwrap().get(external_identifier).cloned())
    }
}

/// DLCS that records submitted batches and answers status checks from maps
#[derive(Default)]
pub struct FakeDlcs {
    pub batches: Mutex<Vec<Vec<String>>>,
    pub successful_batches: Mutex<HashSet<String>>,
    pub successful_images: Mutex<HashSet<String>>,
    pub image_errors: Mutex<HashMap<String, String>>,
    pub failing_images: Mutex<HashSet<String>>,
    pub reject_batches: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl FakeDlcs {
    pub fn submitted(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageBatchApi for FakeDlcs {
    async fn register_batch(&self, registrations: &[Registration]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.reject_batches.lock().unwrap() {
            return Err(MigrationError::dlcs("queue unavailable"));
        }
        let mut batches = self.batches.lock().unwrap();
        batches.push(registrations.iter().map(|r| r.miro_id.clone()).collect());
        Ok(format!("batch-{}", batches.len()))
    }

    async fn check_batch_successful(&self, batch_id: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.successful_batches.lock().unwrap().contains(batch_id))
    }

    async fn check_image_successful(&self, image_id: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_images.lock().unwrap().contains(image_id) {
            return Err(MigrationError::dlcs("timed out"));
        }
        Ok(self.successful_images.lock().unwrap().contains(image_id))
    }

    async fn get_image_error(&self, image_id: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.image_errors.lock().unwrap().get(image_id).cloned())
    }
}

/// Log sink for asserting on what a stage logged
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install a subscriber writing into this buffer for the current thread
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
