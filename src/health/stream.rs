//! Event stream watching.
//!
//! # State Machine
//! ```text
//! Disconnected ──connect ok──→ Connected (backoff reset)
//! Connected ──message──→ Connected
//! Connected ──idle timeout──→ ping ──→ Connected (ping outstanding)
//! Connected ──idle timeout, ping outstanding──→ Waiting (peer unresponsive)
//! Connected ──close / end / error──→ Waiting(backoff step) ──→ Disconnected
//! Any ──shutdown──→ exit (Connected sends a close frame first)
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::health::MonitorError;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::BackoffState;

/// How a connected session ended.
enum SessionEnd {
    Shutdown,
    Disconnected(MonitorError),
}

pub struct EventStreamWatcher {
    url: String,
    idle_timeout: Duration,
    backoff: BackoffState,
}

impl EventStreamWatcher {
    pub fn new(url: impl Into<String>, idle_timeout: Duration, backoff: BackoffState) -> Self {
        Self {
            url: url.into(),
            idle_timeout,
            backoff,
        }
    }

    /// Connect, listen and reconnect until shutdown.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        tracing::info!(url = %self.url, "Event stream watcher starting");

        loop {
            let error = match self.session(&mut shutdown).await {
                SessionEnd::Shutdown => break,
                SessionEnd::Disconnected(e) => e,
            };

            metrics::record_stream_reconnect();
            let delay = self.backoff.on_failure();
            tracing::warn!(
                error = %error,
                retry_in_secs = delay.as_secs_f64(),
                "[ALERT] Event stream disconnected, reconnecting"
            );

            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Event stream watcher received shutdown signal, exiting loop");
    }

    async fn session(&mut self, shutdown: &mut ShutdownSignal) -> SessionEnd {
        let connected = tokio::select! {
            connected = connect_async(self.url.as_str()) => connected,
            _ = shutdown.recv() => return SessionEnd::Shutdown,
        };
        let mut ws = match connected {
            Ok((ws, _)) => ws,
            Err(e) => return SessionEnd::Disconnected(MonitorError::Stream(e.to_string())),
        };

        self.backoff.on_success();
        tracing::info!(url = %self.url, "Connected to event stream");

        // Cleared by any inbound frame, Pong included.
        let mut ping_outstanding = false;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    match time::timeout(self.idle_timeout, ws.close(None)).await {
                        Ok(Err(e)) => tracing::debug!(error = %e, "Close handshake failed"),
                        Err(_) => tracing::debug!("Close handshake timed out"),
                        Ok(Ok(())) => {}
                    }
                    return SessionEnd::Shutdown;
                }
                next = time::timeout(self.idle_timeout, ws.next()) => {
                    if matches!(next, Ok(Some(Ok(_)))) {
                        ping_outstanding = false;
                    }
                    match next {
                        Err(_) if ping_outstanding => {
                            return SessionEnd::Disconnected(MonitorError::Timeout(self.idle_timeout));
                        }
                        Err(_) => {
                            tracing::debug!(idle = ?self.idle_timeout, "Event stream idle, sending ping");
                            match time::timeout(self.idle_timeout, ws.send(Message::Ping(Vec::new().into()))).await {
                                Ok(Ok(())) => ping_outstanding = true,
                                Ok(Err(e)) => {
                                    return SessionEnd::Disconnected(MonitorError::Stream(e.to_string()));
                                }
                                Err(_) => {
                                    return SessionEnd::Disconnected(MonitorError::Timeout(self.idle_timeout));
                                }
                            }
                        }
                        Ok(Some(Ok(Message::Text(text)))) => {
                            tracing::info!(message = %text.as_str(), "Event stream message");
                        }
                        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                            return SessionEnd::Disconnected(MonitorError::StreamClosed);
                        }
                        Ok(Some(Ok(_))) => {}
                        Ok(Some(Err(e))) => {
                            return SessionEnd::Disconnected(MonitorError::Stream(e.to_string()));
                        }
                    }
                }
            }
        }
    }

    pub fn backoff(&self) -> &BackoffState {
        &self.backoff
    }
}
