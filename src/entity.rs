use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::{RobotError, RobotResult};

pub const ENTITY_URL_ENV: &str = "MOONSTREAM_ENTITY_URL";
pub const ROBOTS_HEADER: &str = "X-Moonstream-Robots";
pub const ROBOTS_HEADER_VALUE: &str = "airdrop-robot";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityResponse {
    pub entity_id: String,
    #[serde(default)]
    pub collection_id: String,
    pub address: String,
    #[serde(default)]
    pub blockchain: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub required_fields: Vec<HashMap<String, String>>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySearchResponse {
    #[serde(default)]
    pub total_results: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub next_offset: Option<i64>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub entities: Vec<EntityResponse>,
}

/// Entity directory operations the airdrop cycle depends on
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    /// Entities of the collection that are not tagged `touch:true` yet
    async fn fetch_untouched(&self, collection_id: &str, limit: usize) -> RobotResult<EntitySearchResponse>;

    /// Tag an entity as processed; returns the applied tags
    async fn mark_touched(&self, collection_id: &str, entity_id: &str) -> RobotResult<Vec<String>>;
}

/// HTTP client for the public entity API
#[derive(Clone)]
pub struct HttpEntityClient {
    public_endpoint: String,
    http_client: Client,
    search_timeout: Duration,
    touch_timeout: Duration,
}

impl HttpEntityClient {
    pub fn new(base_url: &str, search_timeout: Duration, touch_timeout: Duration) -> Self {
        Self::with_client(Client::new(), base_url, search_timeout, touch_timeout)
    }

    /// Reuse an existing connection pool
    pub fn with_client(http_client: Client, base_url: &str, search_timeout: Duration, touch_timeout: Duration) -> Self {
        Self {
            public_endpoint: format!("{}/public", base_url.trim_end_matches('/')),
            http_client,
            search_timeout,
            touch_timeout,
        }
    }

    pub fn public_endpoint(&self) -> &str {
        &self.public_endpoint
    }

    async fn request<T: DeserializeOwned>(&self, method: Method, url: &str, timeout: Duration) -> RobotResult<T> {
        debug!("Entity API request: {} {}", method, url);

        let response = self
            .http_client
            .request(method, url)
            .header(ROBOTS_HEADER, ROBOTS_HEADER_VALUE)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| RobotError::DirectoryUnavailable(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RobotError::DirectoryUnavailable(format!(
                "HTTP request failed with status: {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RobotError::DirectoryUnavailable(format!("Failed to read response body: {}", e)))?;

        serde_json::from_str(&body).map_err(|e| {
            RobotError::DirectoryMalformed(format!("Unexpected response from {} ({}): {}", url, status, e))
        })
    }
}

#[async_trait]
impl EntityDirectory for HttpEntityClient {
    async fn fetch_untouched(&self, collection_id: &str, limit: usize) -> RobotResult<EntitySearchResponse> {
        let url = format!(
            "{}/collections/{}/search?required_field=!touch:true&limit={}",
            self.public_endpoint, collection_id, limit
        );
        self.request(Method::GET, &url, self.search_timeout).await
    }

    async fn mark_touched(&self, collection_id: &str, entity_id: &str) -> RobotResult<Vec<String>> {
        let url = format!(
            "{}/collections/{}/entities/{}",
            self.public_endpoint, collection_id, entity_id
        );
        self.request(Method::PUT, &url, self.touch_timeout).await
    }
}
