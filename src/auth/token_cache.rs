//! Token cache implementation
//!
//! Handles the one-time credential exchange and caching of the resulting
//! bearer token for the remainder of the run.

use super::types::Credential;
use crate::error::{Error, Result};
use base64::Engine as _;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

/// Lazily exchanges the pre-shared secret for a bearer token and caches it.
///
/// The exchange endpoint expects a POST carrying
/// `Authorization: Basic base64(secret)` and an empty JSON body; the token
/// is read from a dot-notation field of the JSON response. Within a run the
/// token has no known expiry, so the cache only drops it when the HTTP
/// client calls [`TokenCache::invalidate`] after a rejected data request.
///
/// Clones share the cached credential, so one exchange serves every holder.
#[derive(Clone)]
pub struct TokenCache {
    /// Absolute URL of the token-exchange endpoint
    endpoint: String,
    /// Dot-notation field holding the token in the exchange response
    token_path: String,
    /// Pre-shared secret presented as the Basic credential
    secret: String,
    /// Cached credential, filled by the first `credential()` call
    cached: Arc<RwLock<Option<Credential>>>,
    /// HTTP client for exchange requests
    http_client: Client,
}

impl TokenCache {
    /// Create a new token cache for the given exchange endpoint
    pub fn new(
        endpoint: impl Into<String>,
        token_path: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self::with_client(endpoint, token_path, secret, Client::new())
    }

    /// Create a token cache with a custom HTTP client
    pub fn with_client(
        endpoint: impl Into<String>,
        token_path: impl Into<String>,
        secret: impl Into<String>,
        http_client: Client,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            token_path: token_path.into(),
            secret: secret.into(),
            cached: Arc::new(RwLock::new(None)),
            http_client,
        }
    }

    /// Resolve an exchange endpoint that may be a bare path against the
    /// source's base URL
    pub fn resolve_endpoint(base_url: &str, endpoint: &str) -> Result<String> {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Ok(endpoint.to_string());
        }
        let base = Url::parse(base_url)?;
        Ok(base.join(endpoint)?.to_string())
    }

    /// Return the cached credential, performing the exchange on first use
    pub async fn credential(&self) -> Result<Credential> {
        // Fast path: already exchanged
        {
            let cached = self.cached.read().await;
            if let Some(credential) = cached.as_ref() {
                return Ok(credential.clone());
            }
        }

        let mut cached = self.cached.write().await;

        // Double-check after acquiring the write lock (another task might
        // have completed the exchange)
        if let Some(credential) = cached.as_ref() {
            return Ok(credential.clone());
        }

        let fresh = self.exchange().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the cached credential so the next `credential()` call
    /// re-exchanges
    pub async fn invalidate(&self) {
        let mut cached = self.cached.write().await;
        *cached = None;
    }

    /// Whether a credential is currently cached
    pub async fn is_cached(&self) -> bool {
        self.cached.read().await.is_some()
    }

    /// The exchange endpoint this cache talks to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the Basic-encoded secret and pull the token out of the response
    async fn exchange(&self) -> Result<Credential> {
        debug!("exchanging secret for bearer token at {}", self.endpoint);

        let basic = base64::engine::general_purpose::STANDARD.encode(&self.secret);
        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Authorization", format!("Basic {basic}"))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await.map_err(Error::Http)?;
        let token = extract_field(&body, &self.token_path).ok_or_else(|| {
            Error::auth(format!(
                "could not extract token from path: {}",
                self.token_path
            ))
        })?;

        info!("token exchange succeeded");
        Ok(Credential::new(token))
    }
}

/// Extract a scalar from JSON using a dot-notation path.
/// Supports paths like "$.data.token" or "data.token".
pub fn extract_field(value: &Value, path: &str) -> Option<String> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    let parts: Vec<&str> = path.split('.').collect();

    let mut current = value;
    for part in parts {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            _ => return None,
        }
    }

    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
