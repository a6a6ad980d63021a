//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::schema::{MonitorConfig, ProviderKind, ProxyConfig};
use crate::config::validation::{validate_monitor_config, validate_proxy_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value:?}")]
    Env { name: String, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Source of environment values; a closure in tests, the process env otherwise.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads `std::env`.
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

impl<F> EnvSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, name: &str) -> Option<String> {
        self(name)
    }
}

fn parsed<T: FromStr>(env: &dyn EnvSource, name: &str) -> Result<Option<T>, ConfigError> {
    match env.var(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env {
                name: name.to_string(),
                value,
            }),
    }
}

fn read_toml<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T, ConfigError> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        }
        None => Ok(T::default()),
    }
}

/// Apply proxy environment overrides.
pub fn apply_proxy_env(config: &mut ProxyConfig, env: &dyn EnvSource) -> Result<(), ConfigError> {
    if let Some(port) = parsed::<u16>(env, "API_PROXY_PORT")? {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{host}:{port}");
    }
    for provider in &mut config.providers {
        let key_var = match provider.kind {
            ProviderKind::WeatherApi => "WEATHERAPI_KEY",
            ProviderKind::Weatherstack => "WEATHERSTACK_KEY",
            ProviderKind::Passthrough => continue,
        };
        if let Some(key) = env.var(key_var) {
            provider.api_key = key;
        }
    }
    if let Some(threshold) = parsed(env, "BREAKER_THRESHOLD")? {
        config.breaker.failure_threshold = threshold;
    }
    if let Some(secs) = parsed(env, "BREAKER_RESET_TIMEOUT")? {
        config.breaker.reset_timeout_secs = secs;
    }
    Ok(())
}

/// Apply monitor environment overrides.
pub fn apply_monitor_env(config: &mut MonitorConfig, env: &dyn EnvSource) -> Result<(), ConfigError> {
    if let Some(host) = env.var("API_PROXY_HOST") {
        config.proxy.host = host;
    }
    if let Some(port) = parsed(env, "API_PROXY_PORT")? {
        config.proxy.port = port;
    }
    if let Some(secs) = parsed(env, "HEALTH_CHECK_INTERVAL")? {
        config.poll_interval_secs = secs;
    }
    if let Some(secs) = parsed(env, "HTTP_TIMEOUT")? {
        config.http_timeout_secs = secs;
    }
    if let Some(secs) = parsed(env, "WS_TIMEOUT")? {
        config.idle_timeout_secs = secs;
    }
    if let Some(secs) = parsed(env, "MAX_BACKOFF")? {
        config.max_backoff_secs = secs;
    }
    if let Some(port) = parsed::<u16>(env, "HEARTBEAT_PORT")? {
        config.listener.bind_address = format!("0.0.0.0:{port}");
    }
    Ok(())
}

/// Load, override from the process environment, and validate the proxy config.
pub fn load_proxy_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    load_proxy_config_with(path, &ProcessEnv)
}

pub fn load_proxy_config_with(path: Option<&Path>, env: &dyn EnvSource) -> Result<ProxyConfig, ConfigError> {
    let mut config: ProxyConfig = read_toml(path)?;
    apply_proxy_env(&mut config, env)?;
    validate_proxy_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load, override from the process environment, and validate the monitor config.
pub fn load_monitor_config(path: Option<&Path>) -> Result<MonitorConfig, ConfigError> {
    load_monitor_config_with(path, &ProcessEnv)
}

pub fn load_monitor_config_with(path: Option<&Path>, env: &dyn EnvSource) -> Result<MonitorConfig, ConfigError> {
    let mut config: MonitorConfig = read_toml(path)?;
    apply_monitor_env(&mut config, env)?;
    validate_monitor_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
