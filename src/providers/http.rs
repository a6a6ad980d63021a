//! HTTP JSON provider with outcome classification.
//!
//! # Classification
//! ```text
//! connect/send timeout        → Timeout
//! other transport failure     → TransportError
//! 429                         → RateLimited
//! 401, 403                    → AuthError
//! other non-2xx               → UpstreamError(status)
//! body not JSON               → UpstreamError(malformed body)
//! body has "error" marker     → UpstreamError(upstream message)
//! normalization fails         → UpstreamError(missing field)
//! otherwise                   → Success(normalized payload)
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use crate::providers::{NormalizedPayload, Normalizer, ProviderAdapter, ProviderError, ProviderResult};

/// A provider reached with one GET per query.
pub struct HttpJsonProvider {
    id: String,
    endpoint: Url,
    api_key: String,
    client: reqwest::Client,
    normalizer: Arc<dyn Normalizer>,
}

impl HttpJsonProvider {
    /// Build a provider with its own client bounded by `timeout`.
    pub fn new(
        id: impl Into<String>,
        endpoint: Url,
        api_key: impl Into<String>,
        timeout: Duration,
        normalizer: Arc<dyn Normalizer>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ProviderError::TransportError(e.to_string()))?;

        Ok(Self {
            id: id.into(),
            endpoint,
            api_key: api_key.into(),
            client,
            normalizer,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn classify_transport(err: reqwest::Error) -> ProviderError {
        // The URL carries the API key, keep it out of the message.
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::TransportError(err.without_url().to_string())
        }
    }

    fn classify_status(status: StatusCode) -> Option<ProviderError> {
        match status {
            StatusCode::TOO_MANY_REQUESTS => Some(ProviderError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(ProviderError::AuthError {
                status: status.as_u16(),
            }),
            s if !s.is_success() => Some(ProviderError::UpstreamError(format!("status {}", s.as_u16()))),
            _ => None,
        }
    }

    /// Message carried by an explicit `error` marker in the body.
    fn error_marker(body: &Value) -> Option<String> {
        let marker = body.get("error")?;
        let message = ["info", "message"]
            .iter()
            .find_map(|key| marker.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| marker.as_str().map(str::to_string))
            .unwrap_or_else(|| marker.to_string());
        Some(message)
    }
}

#[async_trait]
impl ProviderAdapter for HttpJsonProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, query: &str) -> ProviderResult {
        let params = self.normalizer.query_params(query, &self.api_key);

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&params)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        if let Some(err) = Self::classify_status(response.status()) {
            return Err(err);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(Self::classify_transport)?;
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::UpstreamError(format!("malformed body: {e}")))?;

        if let Some(message) = Self::error_marker(&body) {
            return Err(ProviderError::UpstreamError(message));
        }

        let fields = self
            .normalizer
            .normalize(&self.id, &body)
            .map_err(ProviderError::UpstreamError)?;

        Ok(NormalizedPayload::new(self.id.clone(), fields))
    }
}

impl std::fmt::Debug for HttpJsonProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpJsonProvider")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}
