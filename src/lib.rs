//! Resilient provider proxy library.

pub mod config;
pub mod events;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod providers;
pub mod resilience;

pub use config::schema::{MonitorConfig, ProxyConfig};
pub use health::HeartbeatMonitor;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
