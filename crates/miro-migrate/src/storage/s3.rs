//! S3 implementation of [`ObjectStore`]

use super::ObjectStore;
use crate::config::S3Config;
use crate::error::{MigrationError, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use miro_common::S3Location;
use tracing::{debug, info, instrument};

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client from explicit settings.
    ///
    /// Static keys are used when both are configured; otherwise credentials
    /// come from the standard AWS provider chain (profile, SSO, instance role).
    pub async fn new(config: &S3Config) -> Result<Self> {
        debug!(region = %config.region, endpoint = ?config.endpoint, "Initializing S3 client");

        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "miro-migrate");
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .credentials_provider(credentials)
            }
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        builder = builder
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip_all, fields(location = %location))]
    async fn head(&self, location: &S3Location) -> Result<Option<u64>> {
        let response = self
            .client
            .head_object()
            .bucket(&location.s3_bucket)
            .key(&location.s3_key)
            .send()
            .await;

        match response {
            Ok(head) => Ok(Some(head.content_length().unwrap_or(0).max(0) as u64)),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
            Err(e) => Err(MigrationError::object_storage(format!(
                "Failed to check {}: {}",
                location, e
            ))),
        }
    }

    #[instrument(skip_all, fields(source = %source, destination = %destination))]
    async fn copy(&self, source: &S3Location, destination: &S3Location) -> Result<()> {
        let copy_source = format!(
            "{}/{}",
            source.s3_bucket,
            urlencoding::encode(&source.s3_key)
        );

        self.client
            .copy_object()
            .copy_source(copy_source)
            .bucket(&destination.s3_bucket)
            .key(&destination.s3_key)
            .send()
            .await
            .map_err(|e| {
                MigrationError::object_storage(format!(
                    "Failed to copy {} to {}: {}",
                    source, destination, e
                ))
            })?;

        info!("Copied {} to {}", source, destination);
        Ok(())
    }

    #[instrument(skip_all, fields(location = %location))]
    async fn get(&self, location: &S3Location) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&location.s3_bucket)
            .key(&location.s3_key)
            .send()
            .await
            .map_err(|e| MigrationError::object_storage(format!("Failed to download {}: {}", location, e)))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| MigrationError::object_storage(format!("Failed to read {}: {}", location, e)))?
            .into_bytes()
            .to_vec();

        debug!(bytes = data.len(), "Downloaded {}", location);
        Ok(data)
    }

    #[instrument(skip_all, fields(location = %location))]
    async fn put(&self, location: &S3Location, data: Vec<u8>, content_type: Option<&str>) -> Result<()> {
        let size = data.len();

        let mut request = self
            .client
            .put_object()
            .bucket(&location.s3_bucket)
            .key(&location.s3_key)
            .body(ByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .map_err(|e| MigrationError::object_storage(format!("Failed to upload {}: {}", location, e)))?;

        info!(bytes = size, "Uploaded {}", location);
        Ok(())
    }
}
