//! Transfer-package builder
//!
//! Turns a chunk into a gzipped BagIt tarball in the transfer bucket. The
//! package location is derived from the chunk id and recorded on the chunk
//! before anything is uploaded, so an interrupted run leaves a chunk that
//! points at where its package should be rather than no trace at all.

use crate::config::TransferConfig;
use crate::error::{MigrationError, Result};
use crate::models::{Chunk, PackageUpload, TransferPackage};
use crate::storage::ObjectStore;
use crate::store::{DocumentQuery, IndexStore, IndexStoreExt};
use chrono::Utc;
use colored::Colorize;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::TryStreamExt;
use miro_common::S3Location;
use sha2::{Digest, Sha256};
use std::io::Write;
use tracing::{debug, error, info, warn};

const PACKAGE_CONTENT_TYPE: &str = "application/gzip";

/// Builds, uploads and verifies chunk packages
pub struct TransferPackageBuilder<'a> {
    objects: &'a dyn ObjectStore,
    transfer: &'a TransferConfig,
}

/// Outcome of one `transfer-package-chunks` run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    /// Chunks whose package was verified in place
    pub verified: Vec<String>,
    /// Chunks that had a recorded package that failed verification
    pub rebuilt: Vec<String>,
    pub uploaded: Vec<String>,
    pub failed: Vec<String>,
}

impl<'a> TransferPackageBuilder<'a> {
    pub fn new(objects: &'a dyn ObjectStore, transfer: &'a TransferConfig) -> Self {
        Self { objects, transfer }
    }

    /// Deterministic package location for a chunk
    pub fn package_location(&self, chunk: &Chunk) -> S3Location {
        let file_name = format!("{}.tar.gz", chunk.external_identifier());
        let prefix = self.transfer.transfer_prefix.trim_matches('/');
        let key = if prefix.is_empty() {
            file_name
        } else {
            format!("{}/{}", prefix, file_name)
        };
        S3Location::new(self.transfer.transfer_bucket.clone(), key)
    }

    pub fn create_package(&self, chunk: &Chunk) -> TransferPackage {
        TransferPackage::new(self.package_location(chunk))
    }

    /// Confirm a chunk's recorded upload is really in the transfer bucket
    pub async fn check_uploaded(&self, chunk: &Chunk) -> Result<()> {
        let Some(package) = &chunk.transfer_package else {
            return Err(MigrationError::verification(
                chunk.chunk_id(),
                "no transfer package recorded",
            ));
        };
        let Some(upload) = &package.upload else {
            return Err(MigrationError::verification(&package.location, "package was never uploaded"));
        };

        match self.objects.head(&package.location).await? {
            None => Err(MigrationError::verification(&package.location, "package not found")),
            Some(size) if size != upload.content_length => Err(MigrationError::verification(
                &package.location,
                format!("expected {} bytes, found {}", upload.content_length, size),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Fetch the chunk's source objects, pack them and write the package
    pub async fn upload_package(&self, chunk: &Chunk, package: TransferPackage) -> Result<TransferPackage> {
        let mut files = Vec::with_capacity(chunk.s3_keys.len());
        for key in &chunk.s3_keys {
            let source = S3Location::new(self.transfer.source_bucket.clone(), key.clone());
            let data = self.objects.get(&source).await?;
            files.push((key.clone(), data));
        }

        let archive = build_bag_archive(chunk, &files)?;
        let content_length = archive.len() as u64;
        let sha256 = hex::encode(Sha256::digest(&archive));

        debug!(chunk_id = %chunk.chunk_id(), files = files.len(), bytes = content_length, "Built package");

        self.objects
            .put(&package.location, archive, Some(PACKAGE_CONTENT_TYPE))
            .await?;

        Ok(TransferPackage {
            upload: Some(PackageUpload {
                uploaded_at: Utc::now(),
                content_length,
                sha256,
            }),
            ..package
        })
    }

    /// Build and upload a package for every chunk that lacks a verified one.
    ///
    /// A chunk whose recorded package fails verification is logged and
    /// rebuilt; a chunk that fails to build is logged and left for the next run.
    pub async fn transfer_chunks(&self, store: &dyn IndexStore, chunks_index: &str) -> Result<TransferSummary> {
        let chunks: Vec<Chunk> = store
            .iterate_records(chunks_index, DocumentQuery::All)
            .try_collect()
            .await?;

        let mut summary = TransferSummary::default();

        for mut chunk in chunks {
            let chunk_id = chunk.chunk_id();

            if chunk.is_uploaded() {
                match self.check_uploaded(&chunk).await {
                    Ok(()) => {
                        println!("{} '{}': transfer package has S3 location, skipping.", "✓".green(), chunk_id);
                        summary.verified.push(chunk_id);
                        continue;
                    }
                    Err(e) => {
                        warn!(chunk_id = %chunk_id, error = %e, "Uploaded chunk check failed, rebuilding");
                        println!("{} Uploaded chunk check failed: {}", "!".yellow(), e);
                        println!("{} Retrying chunk: {}", "→".cyan(), chunk_id);
                        summary.rebuilt.push(chunk_id.clone());
                    }
                }
            }

            let package = self.create_package(&chunk);
            chunk.transfer_package = Some(package.clone());
            store.put_record(chunks_index, &chunk_id, &chunk).await?;

            match self.upload_package(&chunk, package).await {
                Ok(uploaded) => {
                    println!("{} '{}' uploaded to {}", "✓".green(), chunk_id, uploaded.location);
                    chunk.transfer_package = Some(uploaded);
                    store.put_record(chunks_index, &chunk_id, &chunk).await?;
                    summary.uploaded.push(chunk_id);
                }
                Err(e) => {
                    error!(chunk_id = %chunk_id, error = %e, "Failed to upload transfer package");
                    println!("{} '{}': {}", "✗".red(), chunk_id, e);
                    summary.failed.push(chunk_id);
                }
            }
        }

        info!(
            verified = summary.verified.len(),
            rebuilt = summary.rebuilt.len(),
            uploaded = summary.uploaded.len(),
            failed = summary.failed.len(),
            "Transferred chunk packages"
        );
        Ok(summary)
    }
}

/// Pack files as a BagIt bag inside a gzipped tarball.
///
/// Headers carry a zero mtime so the same inputs give the same bytes.
fn build_bag_archive(chunk: &Chunk, files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let mut manifest = String::new();
    let mut payload_bytes = 0u64;
    for (key, data) in files {
        let path = format!("data/{}", key.trim_start_matches('/'));
        manifest.push_str(&format!("{}  {}\n", hex::encode(Sha256::digest(data)), path));
        payload_bytes += data.len() as u64;
        append_file(&mut builder, &path, data)?;
    }

    let bagit = "BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n".to_string();
    let bag_info = format!(
        "External-Identifier: {}\nInternal-Sender-Identifier: {}\nPayload-Oxum: {}.{}\nSource-Organization: Wellcome Collection\n",
        chunk.external_identifier(),
        chunk.chunk_id(),
        payload_bytes,
        files.len()
    );

    let mut tag_manifest = String::new();
    for (name, contents) in [
        ("bagit.txt", &bagit),
        ("bag-info.txt", &bag_info),
        ("manifest-sha256.txt", &manifest),
    ] {
        append_file(&mut builder, name, contents.as_bytes())?;
        tag_manifest.push_str(&format!("{}  {}\n", hex::encode(Sha256::digest(contents.as_bytes())), name));
    }
    append_file(&mut builder, "tagmanifest-sha256.txt", tag_manifest.as_bytes())?;

    let mut encoder = builder.into_inner()?;
    encoder.flush()?;
    Ok(encoder.finish()?)
}

fn append_file<W: Write>(builder: &mut tar::Builder<W>, path: &str, data: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    builder.append_data(&mut header, path, data)?;
    Ok(())
}
