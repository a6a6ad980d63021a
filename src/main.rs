//! Resilient Provider Proxy
//!
//! Serves data from an ordered chain of upstream providers, falling back
//! when one fails and suppressing calls to persistently failing ones.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                 RESILIENT PROXY                      │
//!                     │                                                      │
//!  GET /resolve ──────┼─▶ http server ──▶ FallbackOrchestrator               │
//!                     │                     │                                │
//!                     │                     ├─▶ BreakerRegistry (per id)     │
//!                     │                     ├─▶ provider 1 ───────────────────┼──▶ upstream A
//!                     │                     ├─▶ provider 2 ───────────────────┼──▶ upstream B
//!                     │                     └─▶ EventBroadcaster             │
//!                     │                             │                        │
//!  WS /ws/heartbeat ◀─┼─────────────────────────────┘                        │
//!  GET /health ◀──────┼── breaker snapshot                                   │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use resilient_proxy::config::load_proxy_config;
use resilient_proxy::http::HttpServer;
use resilient_proxy::lifecycle::{spawn_signal_handler, Shutdown};
use resilient_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "resilient-proxy")]
#[command(about = "Provider proxy with fallback and circuit breaking", long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_proxy_config(args.config.as_deref())?;

    logging::init(&config.observability.log_level);
    tracing::info!("resilient-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        providers = ?config.providers.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        failure_threshold = config.breaker.failure_threshold,
        reset_timeout_secs = config.breaker.reset_timeout_secs,
        "Configuration loaded"
    );

    metrics::init_from_config(
        config.observability.metrics_enabled,
        &config.observability.metrics_address,
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config, shutdown.subscribe())?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
