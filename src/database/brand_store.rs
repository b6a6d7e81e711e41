//! Ad-hoc access to a brand's own order store.
//!
//! Brand stores expose a PostgREST-style API. Credentials arrive per request
//! from the caller, so every connection is checked against the configured
//! host allow-list before any request leaves the process.

use crate::error::{AppError, AppResult};
use crate::models::BrandOrderUpdate;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, warn};

/// Caller-supplied brand store credentials
#[derive(Clone)]
pub struct BrandCredentials {
    pub url: String,
    pub key: String,
}

impl std::fmt::Debug for BrandCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrandCredentials")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// One brand's `orders` table
#[async_trait]
pub trait BrandStore: Send + Sync {
    /// Apply `update` to the brand order with id `order_id`. Returns the number of rows changed.
    async fn update_order(&self, order_id: &str, update: &BrandOrderUpdate) -> AppResult<u64>;
}

/// Opens brand store connections from caller-supplied credentials.
pub trait BrandStoreConnector: Send + Sync {
    fn connect(&self, credentials: &BrandCredentials) -> AppResult<Box<dyn BrandStore>>;
}

/// Host allow-list for brand store URLs. `None` allows any host.
#[derive(Debug, Clone, Default)]
pub struct BrandHostPolicy {
    allowed_hosts: Option<Vec<String>>,
}

impl BrandHostPolicy {
    pub fn new(allowed_hosts: Option<Vec<String>>) -> Self {
        Self {
            allowed_hosts: allowed_hosts.map(|hosts| {
                hosts
                    .into_iter()
                    .map(|h| h.trim().to_ascii_lowercase())
                    .collect()
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        self.allowed_hosts.is_none()
    }

    /// Parse `url` and check its host. Only http(s) URLs with a host are accepted.
    pub fn check(&self, url: &str) -> AppResult<Url> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::validation(format!("Invalid brand database URL: {}", e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::validation(format!(
                "Unsupported brand database URL scheme '{}'",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| AppError::validation("Brand database URL has no host"))?
            .to_ascii_lowercase();

        if let Some(allowed) = &self.allowed_hosts {
            if !allowed.iter().any(|h| *h == host) {
                return Err(AppError::forbidden(format!(
                    "Brand database host '{}' is not allowed",
                    host
                )));
            }
        }

        Ok(parsed)
    }
}

/// Connector producing [`RestBrandStore`] clients over a shared HTTP client
pub struct RestBrandStoreConnector {
    client: Client,
    policy: BrandHostPolicy,
}

impl RestBrandStoreConnector {
    pub fn new(policy: BrandHostPolicy, timeout_secs: u64) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        if policy.is_open() {
            warn!("BRAND_STORE_ALLOWED_HOSTS is not set; brand status updates will reach any caller-supplied host");
        }

        Ok(Self { client, policy })
    }
}

impl BrandStoreConnector for RestBrandStoreConnector {
    fn connect(&self, credentials: &BrandCredentials) -> AppResult<Box<dyn BrandStore>> {
        let base_url = self.policy.check(&credentials.url)?;
        Ok(Box::new(RestBrandStore {
            client: self.client.clone(),
            base_url,
            key: credentials.key.clone(),
        }))
    }
}

/// PostgREST client for a single brand store
pub struct RestBrandStore {
    client: Client,
    base_url: Url,
    key: String,
}

impl RestBrandStore {
    fn orders_url(&self, order_id: &str) -> AppResult<Url> {
        let mut url = self
            .base_url
            .join("rest/v1/orders")
            .map_err(|e| AppError::validation(format!("Invalid brand database URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", order_id));
        Ok(url)
    }
}

#[async_trait]
impl BrandStore for RestBrandStore {
    async fn update_order(&self, order_id: &str, update: &BrandOrderUpdate) -> AppResult<u64> {
        let url = self.orders_url(order_id)?;
        debug!(host = ?self.base_url.host_str(), order_id, "Updating brand order");

        let response = self
            .client
            .patch(url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await
            .map_err(|e| AppError::upstream("Brand store", format!("Request error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                "Brand store",
                format!("HTTP {}: {}", status, body),
            ));
        }

        let rows: Vec<serde_json::Value> = response.json().await.map_err(|e| {
            AppError::upstream("Brand store", format!("Invalid response format: {}", e))
        })?;

        Ok(rows.len() as u64)
    }
}
