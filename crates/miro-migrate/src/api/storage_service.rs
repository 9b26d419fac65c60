//! Storage service API client
//!
//! Read-only lookups the upload reconciler folds into transfer records.
//! Authentication is OAuth2 client credentials: a token is fetched once when
//! the client is built and sent as a bearer token on every request.

use crate::api::endpoints;
use crate::config::StorageServiceConfig;
use crate::error::{MigrationError, Result};
use crate::models::{Bag, Ingest};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Storage service lookups used by the pipeline
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Most recent ingest for a bag, if the storage service has seen one
    async fn find_ingest(&self, space: &str, external_identifier: &str) -> Result<Option<Ingest>>;

    /// Latest version of a bag, if it has been stored
    async fn get_bag(&self, space: &str, external_identifier: &str) -> Result<Option<Bag>>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    description: Option<String>,
}

/// HTTP client for the storage service API
pub struct StorageServiceClient {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl StorageServiceClient {
    /// Create a client that sends `token` (when given) as a bearer token
    pub fn new(api_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let api_url = api_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    /// Fetch a client-credentials token and create an authenticated client
    pub async fn with_oauth(config: &StorageServiceConfig, timeout: Duration) -> Result<Self> {
        let (Some(token_url), Some(client_id), Some(client_secret)) = (
            config.token_url.as_deref(),
            config.client_id.as_deref(),
            config.client_secret.as_deref(),
        ) else {
            return Err(MigrationError::config(
                "STORAGE_TOKEN_URL, STORAGE_CLIENT_ID and STORAGE_CLIENT_SECRET must be set",
            ));
        };

        let client = Client::builder().timeout(timeout).build()?;

        debug!(token_url, client_id, "Fetching storage service token");

        let response = client
            .post(token_url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MigrationError::config(format!(
                "Token request to {} failed with {}",
                token_url,
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: Some(token.access_token),
        })
    }

    async fn get(&self, url: &str) -> Result<Response> {
        debug!(url, "GET");

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        Ok(request.send().await?)
    }
}

/// Map storage service status codes onto errors: 5xx is a server error,
/// any other 4xx a user error carrying the service's description
async fn check_api_resp(response: Response) -> Result<Response> {
    let status = response.status();

    if status.is_server_error() {
        return Err(MigrationError::StorageServiceServer(format!(
            "{} returned {}",
            response.url(),
            status
        )));
    }

    if status.is_client_error() {
        let description = response
            .json::<ErrorResponse>()
            .await
            .ok()
            .and_then(|body| body.description)
            .unwrap_or_else(|| status.to_string());
        return Err(MigrationError::StorageServiceUser(description));
    }

    Ok(response)
}

#[async_trait]
impl StorageService for StorageServiceClient {
    async fn find_ingest(&self, space: &str, external_identifier: &str) -> Result<Option<Ingest>> {
        let url = endpoints::find_ingests_url(&self.api_url, space, external_identifier);
        let response = self.get(&url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let ingests: Vec<Ingest> = check_api_resp(response).await?.json().await?;
        Ok(ingests.into_iter().next())
    }

    async fn get_bag(&self, space: &str, external_identifier: &str) -> Result<Option<Bag>> {
        let url = endpoints::bag_url(&self.api_url, space, external_identifier);
        let response = self.get(&url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Ok(Some(check_api_resp(response).await?.json().await?))
    }
}
