//! Heartbeat monitoring of a running proxy.
//!
//! # Data Flow
//! ```text
//! HeartbeatMonitor::spawn
//!     → active.rs (GET /health on a backoff schedule, [ALERT] on failure)
//!     → stream.rs (WebSocket event stream, idle pings, reconnect with backoff)
//! Both loops exit when the shared ShutdownSignal fires.
//! ```
//!
//! # Design Decisions
//! - Each loop owns its own BackoffState; nothing else is shared
//! - Loop errors are logged and drive backoff, never end the process
//! - Shutdown waits are bounded by a grace period

use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::MonitorConfig;
use crate::lifecycle::Shutdown;
use crate::resilience::BackoffState;

pub mod active;
pub mod stream;

pub use active::HealthPoller;
pub use stream::EventStreamWatcher;

/// Failure of one monitor iteration.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid url '{0}'")]
    InvalidUrl(String),

    #[error("health check returned status {0}")]
    UnhealthyStatus(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("stream closed by peer")]
    StreamClosed,
}

/// Companion process watching the proxy through two independent loops.
pub struct HeartbeatMonitor {
    config: MonitorConfig,
}

impl HeartbeatMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    /// Start the poll and stream loops.
    pub fn spawn(&self, shutdown: &Shutdown) -> Result<MonitorHandle, MonitorError> {
        let config = &self.config;
        let max = Duration::from_secs(config.max_backoff_secs);

        let poller = HealthPoller::new(
            &config.proxy.health_url(),
            Duration::from_secs(config.http_timeout_secs),
            BackoffState::new(Duration::from_secs(config.poll_interval_secs), max),
        )?;
        let watcher = EventStreamWatcher::new(
            config.proxy.stream_url(),
            Duration::from_secs(config.idle_timeout_secs),
            BackoffState::new(Duration::from_secs(config.min_backoff_secs), max),
        );

        tracing::info!(
            health_url = %config.proxy.health_url(),
            stream_url = %config.proxy.stream_url(),
            "Heartbeat monitor starting"
        );

        Ok(MonitorHandle {
            poll: tokio::spawn(poller.run(shutdown.subscribe())),
            stream: tokio::spawn(watcher.run(shutdown.subscribe())),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

/// Join handles of the two monitor loops.
pub struct MonitorHandle {
    poll: JoinHandle<()>,
    stream: JoinHandle<()>,
}

impl MonitorHandle {
    /// Wait up to `grace` for both loops; abort stragglers. Returns true if both exited in time.
    pub async fn join(mut self, grace: Duration) -> bool {
        let finished = time::timeout(grace, async {
            let _ = (&mut self.poll).await;
            let _ = (&mut self.stream).await;
        })
        .await
        .is_ok();

        if !finished {
            tracing::warn!(grace_secs = grace.as_secs(), "Monitor tasks did not stop in time, aborting");
            self.poll.abort();
            self.stream.abort();
        }
        finished
    }
}
