//! Response shaping.
//!
//! # Responsibilities
//! - Map an orchestration outcome to a status code and JSON body
//! - Build the `/health` report from breaker state
//!
//! # Design Decisions
//! - Exhaustion is the only user-visible failure and maps to 503
//! - Probing breakers report as "closed"; only a suppressing breaker is "open"
//! - `inactiveProviders` lists exactly the providers whose breaker is "open"

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resilience::{BreakerStatus, FallbackOrchestrator, OrchestrationOutcome};

impl IntoResponse for OrchestrationOutcome {
    fn into_response(self) -> Response {
        match self {
            OrchestrationOutcome::Resolved(payload) => (StatusCode::OK, Json(payload.into_json())).into_response(),
            OrchestrationOutcome::Exhausted(degraded) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(degraded)).into_response()
            }
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub active_provider: String,
    pub inactive_providers: Vec<String>,
    pub breaker_status: BTreeMap<String, String>,
    pub failure_counts: BTreeMap<String, u32>,
    pub time: DateTime<Utc>,
}

impl HealthReport {
    pub fn from_orchestrator(orchestrator: &FallbackOrchestrator) -> Self {
        let active = orchestrator.active_provider();
        let providers = orchestrator.provider_health();

        let inactive_providers = providers
            .iter()
            .filter(|p| p.status == BreakerStatus::Open)
            .map(|p| p.id.clone())
            .collect();
        let breaker_status = providers
            .iter()
            .map(|p| (p.id.clone(), p.status.as_health_label().to_string()))
            .collect();
        let failure_counts = providers
            .iter()
            .map(|p| (p.id.clone(), p.consecutive_failures))
            .collect();

        Self {
            status: "ok".to_string(),
            active_provider: active,
            inactive_providers,
            breaker_status,
            failure_counts,
            time: Utc::now(),
        }
    }
}

impl IntoResponse for HealthReport {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
