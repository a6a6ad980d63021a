//! Ordered provider fallback.
//!
//! # Decision Table (per provider, in chain order)
//! ```text
//! permit(id) == false  → emit ProviderSkippedBreakerOpen, next provider
//! fetch → Ok(payload)  → record_success, emit ProviderSelected, return
//! fetch → Err(kind)    → record_failure, emit ProviderFailed, next provider
//! chain exhausted      → emit AllExhausted, return degraded outcome
//! ```
//!
//! # Design Decisions
//! - First success wins; no best-of-N comparison
//! - Skipped and failed providers are treated alike for continuation
//! - Order is fixed by configuration

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::events::{EventBroadcaster, OrchestrationEvent};
use crate::observability::metrics;
use crate::providers::{NormalizedPayload, ProviderAdapter};
use crate::resilience::circuit_breaker::{BreakerRegistry, BreakerStatus};

/// Status marker carried by the degraded response.
pub const UNAVAILABLE: &str = "unavailable";

/// Body returned when every provider failed or was skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedResponse {
    pub query: String,
    pub payload: Option<Value>,
    pub status: &'static str,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl DegradedResponse {
    fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            payload: None,
            status: UNAVAILABLE,
            message: "All providers are unavailable. Stubbed response.".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Result of one resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestrationOutcome {
    Resolved(NormalizedPayload),
    Exhausted(DegradedResponse),
}

impl OrchestrationOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, OrchestrationOutcome::Resolved(_))
    }
}

/// Per-provider view used by the health surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderHealth {
    pub id: String,
    pub status: BreakerStatus,
    pub consecutive_failures: u32,
}

/// Walks the provider chain under circuit-breaker control.
pub struct FallbackOrchestrator {
    chain: Vec<Arc<dyn ProviderAdapter>>,
    breakers: Arc<BreakerRegistry>,
    broadcaster: Arc<EventBroadcaster>,
    active_provider: ArcSwap<String>,
}

impl FallbackOrchestrator {
    /// Create an orchestrator; the first provider starts as the active one.
    pub fn new(
        chain: Vec<Arc<dyn ProviderAdapter>>,
        breakers: Arc<BreakerRegistry>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        let primary = chain
            .first()
            .map(|p| p.id().to_string())
            .unwrap_or_default();
        for provider in &chain {
            breakers.breaker(provider.id());
        }
        Self {
            chain,
            breakers,
            broadcaster,
            active_provider: ArcSwap::from_pointee(primary),
        }
    }

    /// Resolve `query` against the chain.
    pub async fn resolve(&self, query: &str) -> OrchestrationOutcome {
        for provider in &self.chain {
            let id = provider.id();

            if !self.breakers.permit(id) {
                tracing::info!(provider = %id, "Circuit breaker open, skipping provider");
                metrics::record_provider_attempt(id, "skipped");
                self.broadcaster.publish(OrchestrationEvent::skipped(id));
                continue;
            }

            let started = Instant::now();
            match provider.fetch(query).await {
                Ok(payload) => {
                    self.breakers.record_success(id);
                    self.active_provider.store(Arc::new(id.to_string()));
                    tracing::info!(
                        provider = %id,
                        query = %query,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Provider selected"
                    );
                    metrics::record_provider_attempt(id, "success");
                    metrics::record_resolve("resolved");
                    self.broadcaster.publish(OrchestrationEvent::selected(id, query));
                    return OrchestrationOutcome::Resolved(payload);
                }
                Err(e) => {
                    self.breakers.record_failure(id);
                    tracing::warn!(
                        provider = %id,
                        query = %query,
                        kind = e.kind(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                    metrics::record_provider_attempt(id, e.kind());
                    self.broadcaster.publish(OrchestrationEvent::failed(id, &e.to_string()));
                }
            }
        }

        tracing::error!(query = %query, "All providers exhausted, returning stub response");
        metrics::record_resolve("exhausted");
        self.broadcaster.publish(OrchestrationEvent::exhausted(query));
        OrchestrationOutcome::Exhausted(DegradedResponse::new(query))
    }

    /// Id of the provider that served the most recent success.
    pub fn active_provider(&self) -> String {
        self.active_provider.load().as_ref().clone()
    }

    /// Breaker state of every provider, in chain order.
    pub fn provider_health(&self) -> Vec<ProviderHealth> {
        self.chain
            .iter()
            .map(|provider| {
                let breaker = self.breakers.breaker(provider.id());
                ProviderHealth {
                    id: provider.id().to_string(),
                    status: breaker.status(),
                    consecutive_failures: breaker.consecutive_failures(),
                }
            })
            .collect()
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }
}
