//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the provider chain, breakers and broadcaster from config
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, timeout)
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    response::Response,
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::events::EventBroadcaster;
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer, ResolveParams};
use crate::http::response::HealthReport;
use crate::http::websocket;
use crate::lifecycle::ShutdownSignal;
use crate::providers::{build_chain, ProviderAdapter, ProviderError};
use crate::resilience::{BreakerRegistry, FallbackOrchestrator, OrchestrationOutcome};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build provider chain: {0}")]
    Providers(#[from] ProviderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<FallbackOrchestrator>,
    pub shutdown: ShutdownSignal,
}

/// HTTP server for the provider proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    orchestrator: Arc<FallbackOrchestrator>,
    shutdown: ShutdownSignal,
}

impl HttpServer {
    /// Create a server whose providers come from `config`.
    pub fn new(config: ProxyConfig, shutdown: ShutdownSignal) -> Result<Self, ServerError> {
        let chain = build_chain(&config.providers)?;
        Ok(Self::with_chain(config, chain, shutdown))
    }

    /// Create a server over an explicit provider chain.
    pub fn with_chain(config: ProxyConfig, chain: Vec<Arc<dyn ProviderAdapter>>, shutdown: ShutdownSignal) -> Self {
        let breakers = Arc::new(BreakerRegistry::new(
            &config.breaker,
            chain.iter().map(|p| p.id().to_string()),
        ));
        let broadcaster = Arc::new(EventBroadcaster::new(config.events.subscriber_buffer));
        let orchestrator = Arc::new(FallbackOrchestrator::new(chain, breakers, broadcaster));

        let state = AppState {
            orchestrator: orchestrator.clone(),
            shutdown: shutdown.clone(),
        };
        let router = Self::build_router(&config, state);

        Self {
            router,
            config,
            orchestrator,
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(propagate_request_id_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        Router::new()
            .route("/resolve", get(resolve_handler))
            .route("/health", get(health_handler))
            .route("/ws/heartbeat", get(heartbeat_handler))
            .with_state(state)
            .layer(middleware)
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            providers = self.config.providers.len(),
            "HTTP server starting"
        );

        let mut shutdown = self.shutdown;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn orchestrator(&self) -> &Arc<FallbackOrchestrator> {
        &self.orchestrator
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

async fn resolve_handler(State(state): State<AppState>, Query(params): Query<ResolveParams>) -> OrchestrationOutcome {
    tracing::debug!(query = %params.query, "Resolving query");
    state.orchestrator.resolve(&params.query).await
}

async fn health_handler(State(state): State<AppState>) -> HealthReport {
    HealthReport::from_orchestrator(&state.orchestrator)
}

async fn heartbeat_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let broadcaster = state.orchestrator.broadcaster().clone();
    ws.on_upgrade(move |socket| websocket::stream_events(socket, broadcaster, state.shutdown))
}

/// Router of the monitor's echo endpoint (`/ws`).
pub fn echo_router(shutdown: ShutdownSignal) -> Router {
    Router::new()
        .route(
            "/ws",
            get(|ws: WebSocketUpgrade, State(shutdown): State<ShutdownSignal>| async move {
                ws.on_upgrade(move |socket| websocket::echo(socket, shutdown))
            }),
        )
        .with_state(shutdown)
        .layer(TraceLayer::new_for_http())
}
