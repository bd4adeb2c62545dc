use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::core::ports::{ListingRepository, StoreError};
use crate::models::ListingProfile;

/// Errors that can occur when talking to the listing service
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid API key")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl From<ListingError> for StoreError {
    fn from(err: ListingError) -> Self {
        match err {
            ListingError::InvalidResponse(msg) => StoreError::Corrupt(msg),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Read-only client for the listing-management service
///
/// Listings are served as camelCase JSON documents, either bare or wrapped in
/// a `data` envelope:
/// - `GET {base}/listings/{id}`
/// - `GET {base}/listings?ids=a,b,c` -> `{"documents": [...]}`
pub struct ListingClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl ListingClient {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ListingError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.api_key {
            Some(key) => request.header("X-Api-Key", key),
            None => request,
        }
    }

    /// Fetch a single listing; `Ok(None)` when the service reports 404
    pub async fn fetch_listing(&self, id: Uuid) -> Result<Option<ListingProfile>, ListingError> {
        let url = format!("{}/listings/{}", self.base_url, id);

        tracing::debug!("Fetching listing from: {}", url);

        let response = self.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ListingError::Unauthorized)
            }
            status if !status.is_success() => {
                return Err(ListingError::ApiError(format!(
                    "Failed to fetch listing {}: {}",
                    id, status
                )))
            }
            _ => {}
        }

        let json: Value = response.json().await?;
        parse_listing(&json).map(Some)
    }

    /// Fetch several listings in one request; unknown ids are simply absent
    pub async fn fetch_listings(&self, ids: &[Uuid]) -> Result<Vec<ListingProfile>, ListingError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/listings?ids={}",
            self.base_url,
            urlencoding::encode(&joined)
        );

        let response = self.get(&url).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ListingError::Unauthorized)
            }
            status if !status.is_success() => {
                return Err(ListingError::ApiError(format!(
                    "Failed to fetch listings: {}",
                    status
                )))
            }
            _ => {}
        }

        let json: Value = response.json().await?;

        let documents = json
            .get("documents")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ListingError::InvalidResponse("Missing documents array".into()))?;

        let listings: Vec<ListingProfile> = documents
            .iter()
            .filter_map(|doc| match parse_listing(doc) {
                Ok(listing) => Some(listing),
                Err(e) => {
                    tracing::warn!("Skipping malformed listing document: {}", e);
                    None
                }
            })
            .collect();

        tracing::debug!("Fetched {} of {} requested listings", listings.len(), ids.len());

        Ok(listings)
    }
}

fn parse_listing(doc: &Value) -> Result<ListingProfile, ListingError> {
    let data = doc.get("data").unwrap_or(doc);

    serde_json::from_value(data.clone())
        .map_err(|e| ListingError::InvalidResponse(format!("Failed to parse listing: {}", e)))
}

#[async_trait]
impl ListingRepository for ListingClient {
    async fn get_listing(&self, id: Uuid) -> Result<Option<ListingProfile>, StoreError> {
        Ok(self.fetch_listing(id).await?)
    }

    async fn get_listings(&self, ids: &[Uuid]) -> Result<Vec<ListingProfile>, StoreError> {
        Ok(self.fetch_listings(ids).await?)
    }
}
