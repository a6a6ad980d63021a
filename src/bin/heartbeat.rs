//! Heartbeat monitor for the resilient proxy.
//!
//! Polls `/health` and holds the event stream open, alerting and backing
//! off while the proxy is unreachable. Serves an echo WebSocket on `/ws`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use resilient_proxy::config::load_monitor_config;
use resilient_proxy::health::HeartbeatMonitor;
use resilient_proxy::http::echo_router;
use resilient_proxy::lifecycle::{spawn_signal_handler, Shutdown};
use resilient_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "heartbeat")]
#[command(about = "Liveness monitor for the resilient proxy", long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_monitor_config(args.config.as_deref())?;

    logging::init(&config.observability.log_level);
    tracing::info!("heartbeat monitor v{} starting", env!("CARGO_PKG_VERSION"));

    metrics::init_from_config(
        config.observability.metrics_enabled,
        &config.observability.metrics_address,
    );

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Echo endpoint listening");

    let mut server_shutdown = shutdown.subscribe();
    let echo = tokio::spawn(async move {
        let result = axum::serve(listener, echo_router(server_shutdown.clone()))
            .with_graceful_shutdown(async move { server_shutdown.recv().await })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Echo server failed");
        }
    });

    let monitor = HeartbeatMonitor::new(config.clone());
    let handle = monitor.spawn(&shutdown)?;

    shutdown.subscribe().recv().await;
    tracing::info!("Stopping heartbeat monitor");

    let grace = Duration::from_secs(config.shutdown_grace_secs);
    let clean = handle.join(grace).await;
    if tokio::time::timeout(grace, echo).await.is_err() {
        tracing::warn!("Echo server did not stop in time");
    }

    tracing::info!(clean, "Shutdown complete");
    Ok(())
}
