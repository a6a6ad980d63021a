//! Upstream data providers.
//!
//! # Data Flow
//! ```text
//! FallbackOrchestrator
//!     → ProviderAdapter::fetch(query)     (one call, bounded timeout)
//!     → http.rs (transport + classification)
//!     → normalize.rs (upstream JSON → NormalizedPayload)
//!     ← Result<NormalizedPayload, ProviderError>
//! ```
//!
//! # Design Decisions
//! - Classification uses status codes and the body's `error` marker, never message text
//! - Adapters never retry and never touch circuit-breaker state
//! - New upstreams plug in as a `Normalizer`, not a new adapter

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod factory;
pub mod http;
pub mod normalize;

pub use factory::build_chain;
pub use http::HttpJsonProvider;
pub use normalize::{Normalizer, PassthroughNormalizer, WeatherApiNormalizer, WeatherstackNormalizer};

/// Classified provider failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("rate limited")]
    RateLimited,

    #[error("authentication failed (status {status})")]
    AuthError { status: u16 },

    #[error("upstream error: {0}")]
    UpstreamError(String),

    #[error("timed out")]
    Timeout,

    #[error("transport error: {0}")]
    TransportError(String),
}

impl ProviderError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::RateLimited => "rate_limited",
            ProviderError::AuthError { .. } => "auth_error",
            ProviderError::UpstreamError(_) => "upstream_error",
            ProviderError::Timeout => "timeout",
            ProviderError::TransportError(_) => "transport_error",
        }
    }
}

/// Provider output in the common shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPayload {
    pub provider_id: String,
    pub fields: Map<String, Value>,
}

impl NormalizedPayload {
    pub fn new(provider_id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            provider_id: provider_id.into(),
            fields,
        }
    }

    /// Body returned to `/resolve` callers.
    pub fn into_json(self) -> Value {
        Value::Object(self.fields)
    }
}

pub type ProviderResult = Result<NormalizedPayload, ProviderError>;

/// One upstream data source.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identifier used for breakers, events and health reporting.
    fn id(&self) -> &str;

    /// Perform exactly one upstream call for `query`.
    async fn fetch(&self, query: &str) -> ProviderResult;
}
