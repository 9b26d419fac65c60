//! DLCS API client
//!
//! Registrations are queued in batches; each batch and each image can then
//! be checked independently. All requests use HTTP basic auth with the
//! customer's API key and secret.

use crate::api::endpoints;
use crate::config::DlcsConfig;
use crate::error::{MigrationError, Result};
use crate::models::Registration;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Image-batch operations against DLCS
#[async_trait]
pub trait ImageBatchApi: Send + Sync {
    /// Queue one batch and return its batch id
    async fn register_batch(&self, registrations: &[Registration]) -> Result<String>;

    /// Finished, with every image completed and no errors
    async fn check_batch_successful(&self, batch_id: &str) -> Result<bool>;

    /// Finished ingesting without an error
    async fn check_image_successful(&self, image_id: &str) -> Result<bool>;

    async fn get_image_error(&self, image_id: &str) -> Result<Option<String>>;
}

/// DLCS image id for a Miro image
pub fn image_id(miro_id: &str) -> String {
    miro_id.to_string()
}

#[derive(Debug, Serialize)]
struct QueuedImage<'a> {
    id: String,
    space: u32,
    origin: String,
    family: &'a str,
    #[serde(rename = "mediaType")]
    media_type: &'a str,
    string1: &'a str,
}

#[derive(Debug, Serialize)]
struct QueueRequest<'a> {
    #[serde(rename = "@type")]
    kind: &'a str,
    member: Vec<QueuedImage<'a>>,
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    #[serde(rename = "@id")]
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct BatchStatus {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    completed: u64,
    #[serde(default)]
    errors: u64,
    #[serde(default)]
    finished: Option<String>,
}

impl BatchStatus {
    fn successful(&self) -> bool {
        self.finished.is_some() && self.errors == 0 && self.completed == self.count
    }
}

#[derive(Debug, Default, Deserialize)]
struct ImageStatus {
    #[serde(default)]
    ingesting: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    finished: Option<String>,
}

impl ImageStatus {
    fn error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.trim().is_empty())
    }

    fn successful(&self) -> bool {
        !self.ingesting && self.error().is_none() && self.finished.is_some()
    }
}

/// HTTP client for the DLCS API
pub struct DlcsClient {
    client: Client,
    config: DlcsConfig,
    api_key: String,
    api_secret: String,
}

impl DlcsClient {
    pub fn new(config: &DlcsConfig, timeout: Duration) -> Result<Self> {
        let (Some(api_key), Some(api_secret)) = (config.api_key.clone(), config.api_secret.clone())
        else {
            return Err(MigrationError::config("DLCS_API_KEY and DLCS_API_SECRET must be set"));
        };

        let client = Client::builder().timeout(timeout).build()?;
        let mut config = config.clone();
        config.api_url = config.api_url.trim_end_matches('/').to_string();
        config.origin_base_url = config.origin_base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            config,
            api_key,
            api_secret,
        })
    }

    fn origin(&self, file_id: &str) -> String {
        format!("{}/{}", self.config.origin_base_url, file_id.trim_start_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        debug!(url, "GET");

        let response = self
            .client
            .get(url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Ok(Some(check_response(response).await?.json().await?))
    }

    async fn image_status(&self, image_id: &str) -> Result<Option<ImageStatus>> {
        let url = endpoints::image_url(
            &self.config.api_url,
            self.config.customer_id,
            self.config.space_id,
            image_id,
        );
        self.get_json(&url).await
    }
}

async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(MigrationError::dlcs(format!("{} returned {}: {}", url, status, body.trim())))
}

#[async_trait]
impl ImageBatchApi for DlcsClient {
    async fn register_batch(&self, registrations: &[Registration]) -> Result<String> {
        let request = QueueRequest {
            kind: "Collection",
            member: registrations
                .iter()
                .map(|registration| QueuedImage {
                    id: image_id(&registration.miro_id),
                    space: self.config.space_id,
                    origin: self.origin(&registration.file_id),
                    family: "I",
                    media_type: "image/jpeg",
                    string1: "miro",
                })
                .collect(),
        };

        let url = endpoints::queue_url(&self.config.api_url, self.config.customer_id);
        debug!(url, images = registrations.len(), "Queueing DLCS batch");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&request)
            .send()
            .await?;

        let queued: QueueResponse = check_response(response).await?.json().await?;
        Ok(queued.id)
    }

    async fn check_batch_successful(&self, batch_id: &str) -> Result<bool> {
        let url = endpoints::batch_url(&self.config.api_url, self.config.customer_id, batch_id);
        let batch: Option<BatchStatus> = self.get_json(&url).await?;
        Ok(batch.is_some_and(|b| b.successful()))
    }

    async fn check_image_successful(&self, image_id: &str) -> Result<bool> {
        let image = self.image_status(image_id).await?;
        Ok(image.is_some_and(|i| i.successful()))
    }

    async fn get_image_error(&self, image_id: &str) -> Result<Option<String>> {
        match self.image_status(image_id).await? {
            Some(image) => Ok(image.error().map(str::to_string)),
            None => Ok(Some(format!("Image {} not found in DLCS", image_id))),
        }
    }
}
