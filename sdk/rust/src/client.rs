//! Client for the resilient provider proxy.

use std::collections::BTreeMap;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub active_provider: String,
    pub inactive_providers: Vec<String>,
    pub breaker_status: BTreeMap<String, String>,
    pub failure_counts: BTreeMap<String, u32>,
    pub time: String,
}

/// Body of a 503 from `/resolve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradedBody {
    pub query: String,
    pub payload: Option<Value>,
    pub status: String,
    pub message: String,
    pub timestamp: String,
}

/// Result of `GET /resolve`.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Normalized payload from the first provider that succeeded.
    Resolved(Value),
    /// Every provider failed or was skipped.
    Degraded(DegradedBody),
}

impl Resolution {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Resolution::Degraded(_))
    }
}

pub struct ProxyClient {
    client: Client,
    proxy_url: String,
}

impl ProxyClient {
    pub fn new(proxy_url: &str) -> Self {
        Self {
            client: Client::new(),
            proxy_url: proxy_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve `query` through the provider chain.
    pub async fn resolve(&self, query: &str) -> Result<Resolution, Box<dyn std::error::Error>> {
        let resp = self
            .client
            .get(format!("{}/resolve", self.proxy_url))
            .query(&[("query", query)])
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        match status {
            StatusCode::OK => Ok(Resolution::Resolved(serde_json::from_str(&text)?)),
            StatusCode::SERVICE_UNAVAILABLE => Ok(Resolution::Degraded(serde_json::from_str(&text)?)),
            _ => Err(format!("Proxy returned error status {}: {}", status, text).into()),
        }
    }

    /// Fetch provider and breaker status.
    pub async fn health(&self) -> Result<HealthStatus, Box<dyn std::error::Error>> {
        let resp = self.client.get(format!("{}/health", self.proxy_url)).send().await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(format!("Proxy returned error status {}: {}", status, text).into());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// URL of the event stream for this proxy.
    pub fn event_stream_url(&self) -> String {
        format!("{}/ws/heartbeat", self.proxy_url.replacen("http", "ws", 1))
    }
}
