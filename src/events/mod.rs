//! Orchestration events and their fan-out.
//!
//! # Data Flow
//! ```text
//! FallbackOrchestrator
//!     → OrchestrationEvent (immutable value)
//!     → broadcaster.rs (snapshot subscribers, try_send, prune failures)
//!     → per-connection task → WebSocket text frame
//! ```

pub mod broadcaster;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use broadcaster::{EventBroadcaster, Subscriber, SubscriberId};

/// What happened during one step of a fallback resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    ProviderSelected,
    ProviderSkippedBreakerOpen,
    ProviderFailed,
    AllExhausted,
}

/// An immutable record of an orchestration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub provider_id: Option<String>,
    pub detail: String,
}

impl OrchestrationEvent {
    pub fn new(kind: EventKind, provider_id: Option<&str>, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            provider_id: provider_id.map(str::to_string),
            detail: detail.into(),
        }
    }

    pub fn selected(provider_id: &str, query: &str) -> Self {
        Self::new(
            EventKind::ProviderSelected,
            Some(provider_id),
            format!("{provider_id} active for {query}"),
        )
    }

    pub fn skipped(provider_id: &str) -> Self {
        Self::new(
            EventKind::ProviderSkippedBreakerOpen,
            Some(provider_id),
            format!("{provider_id} circuit breaker open, skipping"),
        )
    }

    pub fn failed(provider_id: &str, reason: &str) -> Self {
        Self::new(
            EventKind::ProviderFailed,
            Some(provider_id),
            format!("{provider_id} failed: {reason}"),
        )
    }

    pub fn exhausted(query: &str) -> Self {
        Self::new(
            EventKind::AllExhausted,
            None,
            format!("All providers failed for {query}, returning stub response"),
        )
    }

    /// JSON text frame for stream subscribers.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_string())
    }
}

impl fmt::Display for OrchestrationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:?}: {}", self.timestamp.to_rfc3339(), self.kind, self.detail)
    }
}
