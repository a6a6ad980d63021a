//! Health polling.
//!
//! # Responsibilities
//! - Periodically GET the proxy's `/health`
//! - Reset backoff on 200, grow it and raise an alert otherwise

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;

use crate::health::MonitorError;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::BackoffState;

const MAX_BODY_BYTES: usize = 64 * 1024;

pub struct HealthPoller {
    uri: Uri,
    timeout: Duration,
    backoff: BackoffState,
    client: Client<HttpConnector, Body>,
}

impl HealthPoller {
    pub fn new(url: &str, timeout: Duration, backoff: BackoffState) -> Result<Self, MonitorError> {
        let uri = url.parse::<Uri>().map_err(|_| MonitorError::InvalidUrl(url.to_string()))?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            uri,
            timeout,
            backoff,
            client,
        })
    }

    /// One health check; returns the response body on 200.
    pub async fn poll_once(&self) -> Result<String, MonitorError> {
        let request = Request::builder()
            .method("GET")
            .uri(self.uri.clone())
            .header("user-agent", "heartbeat-monitor")
            .body(Body::empty())
            .map_err(|e| MonitorError::Request(e.to_string()))?;

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| MonitorError::Request(e.to_string()))?;
            let status = response.status();
            if status != StatusCode::OK {
                return Err(MonitorError::UnhealthyStatus(status.as_u16()));
            }
            let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_BODY_BYTES)
                .await
                .map_err(|e| MonitorError::Request(e.to_string()))?;
            Ok(String::from_utf8_lossy(&body).into_owned())
        };

        match time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(MonitorError::Timeout(self.timeout)),
        }
    }

    /// Poll until shutdown.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        tracing::info!(url = %self.uri, interval = ?self.backoff.min(), "Health poller starting");

        loop {
            let result = tokio::select! {
                result = self.poll_once() => result,
                _ = shutdown.recv() => break,
            };

            let delay = match result {
                Ok(status) => {
                    tracing::info!(status = %status, "API Proxy health check ok");
                    metrics::record_poll("ok");
                    self.backoff.on_success()
                }
                Err(e) => {
                    let delay = self.backoff.on_failure();
                    tracing::warn!(
                        error = %e,
                        retry_in_secs = delay.as_secs_f64(),
                        "[ALERT] API Proxy health check failed"
                    );
                    metrics::record_poll("failed");
                    delay
                }
            };

            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Health poller received shutdown signal, exiting loop");
    }

    pub fn backoff(&self) -> &BackoffState {
        &self.backoff
    }
}
