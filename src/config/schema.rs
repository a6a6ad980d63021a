//! Configuration schema definitions.
//!
//! This module defines the configuration structures for the proxy and the
//! heartbeat monitor. All types derive Serde traits for deserialization from
//! config files; every field has a default so minimal files are valid.

use serde::{Deserialize, Serialize};

/// Root configuration for the resilient proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream providers, in fallback order (primary first).
    pub providers: Vec<ProviderConfig>,

    /// Circuit breaker settings shared by all providers.
    pub breaker: BreakerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Event stream settings.
    pub events: EventsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            providers: vec![
                ProviderConfig {
                    id: "weatherapi".to_string(),
                    kind: ProviderKind::WeatherApi,
                    url: "https://api.weatherapi.com/v1/current.json".to_string(),
                    api_key: "default-weatherapi-key".to_string(),
                    timeout_secs: default_provider_timeout(),
                },
                ProviderConfig {
                    id: "weatherstack".to_string(),
                    kind: ProviderKind::Weatherstack,
                    url: "https://api.weatherstack.com/current".to_string(),
                    api_key: "default-weatherstack-key".to_string(),
                    timeout_secs: default_provider_timeout(),
                },
            ],
            breaker: BreakerConfig::default(),
            timeouts: TimeoutConfig::default(),
            events: EventsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Which normalizer an upstream uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    WeatherApi,
    Weatherstack,
    Passthrough,
}

/// One upstream provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Unique provider identifier (breaker key).
    pub id: String,

    /// Payload format of the upstream.
    pub kind: ProviderKind,

    /// Endpoint URL.
    pub url: String,

    /// Credential sent with each request.
    #[serde(default)]
    pub api_key: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_timeout() -> u64 {
    5
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Seconds after the last failure before a probe is allowed.
    pub reset_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_secs: 300,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Event stream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events buffered per subscriber before it is considered stalled.
    pub subscriber_buffer: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 64,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Root configuration for the heartbeat monitor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// The proxy being watched.
    pub proxy: ProxyTarget,

    /// Listener for the monitor's own echo endpoint.
    pub listener: ListenerConfig,

    /// Health poll interval in seconds (poll loop minimum delay).
    pub poll_interval_secs: u64,

    /// Health poll timeout in seconds.
    pub http_timeout_secs: u64,

    /// Seconds without a stream message before a liveness ping.
    pub idle_timeout_secs: u64,

    /// Stream reconnect minimum delay in seconds.
    pub min_backoff_secs: u64,

    /// Maximum delay for either loop in seconds.
    pub max_backoff_secs: u64,

    /// Time allowed for tasks to finish after shutdown, in seconds.
    pub shutdown_grace_secs: u64,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            proxy: ProxyTarget::default(),
            listener: ListenerConfig {
                bind_address: "0.0.0.0:8001".to_string(),
            },
            poll_interval_secs: 5,
            http_timeout_secs: 5,
            idle_timeout_secs: 30,
            min_backoff_secs: 1,
            max_backoff_secs: 60,
            shutdown_grace_secs: 2,
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Address of the monitored proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyTarget {
    pub host: String,
    pub port: u16,
}

impl ProxyTarget {
    pub fn health_url(&self) -> String {
        format!("http://{}:{}/health", self.host, self.port)
    }

    pub fn stream_url(&self) -> String {
        format!("ws://{}:{}/ws/heartbeat", self.host, self.port)
    }
}

impl Default for ProxyTarget {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
        }
    }
}
