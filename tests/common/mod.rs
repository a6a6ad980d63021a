//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use resilient_proxy::config::{ProviderConfig, ProviderKind, ProxyConfig};
use resilient_proxy::http::HttpServer;
use resilient_proxy::lifecycle::Shutdown;
use resilient_proxy::resilience::FallbackOrchestrator;

/// Start a programmable mock upstream; `f` decides status and JSON body per request.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let f = Arc::new(f);
    let app = Router::new().fallback(move || {
        let f = f.clone();
        async move {
            let (status, body) = f().await;
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, [(CONTENT_TYPE, "application/json")], body)
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Mock upstream with a fixed answer and a call counter.
pub async fn start_counting_backend(status: u16, body: String) -> (SocketAddr, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let addr = start_programmable_backend(move || {
        let counter = counter.clone();
        let body = body.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (status, body)
        }
    })
    .await;
    (addr, calls)
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn weatherapi_body(city: &str) -> String {
    serde_json::json!({
        "location": {"name": city},
        "current": {"temp_c": 12.5, "condition": {"text": "Overcast"}}
    })
    .to_string()
}

pub fn weatherstack_body(city: &str) -> String {
    serde_json::json!({
        "location": {"name": city},
        "current": {"temperature": 13, "weather_descriptions": ["Light rain"]}
    })
    .to_string()
}

pub fn provider(id: &str, kind: ProviderKind, addr: SocketAddr) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        kind,
        url: format!("http://{addr}/current"),
        api_key: "test-key".to_string(),
        timeout_secs: 2,
    }
}

/// Proxy config over the given chain with a short-lived breaker.
pub fn proxy_config(providers: Vec<ProviderConfig>, threshold: u32) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.providers = providers;
    config.breaker.failure_threshold = threshold;
    config.breaker.reset_timeout_secs = 300;
    config
}

/// A proxy running on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub orchestrator: Arc<FallbackOrchestrator>,
    pub handle: JoinHandle<()>,
}

impl TestProxy {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/heartbeat", self.addr)
    }
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, shutdown.subscribe()).unwrap();
    let orchestrator = server.orchestrator().clone();

    let handle = tokio::spawn(async move {
        server.run(listener).await.unwrap();
    });

    TestProxy {
        addr,
        shutdown,
        orchestrator,
        handle,
    }
}
