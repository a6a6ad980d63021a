//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, defaults for missing fields)
//!     → environment overrides (API keys, ports, timeouts)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig / MonitorConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow running with no file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_monitor_config, load_proxy_config, ConfigError};
pub use schema::{
    BreakerConfig, EventsConfig, ListenerConfig, MonitorConfig, ObservabilityConfig, ProviderConfig,
    ProviderKind, ProxyConfig, ProxyTarget, TimeoutConfig,
};
