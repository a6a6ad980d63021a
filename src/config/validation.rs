//! Configuration validation.
//!
//! Semantic checks only (serde handles syntax). Every error is collected so
//! operators see all problems at once.

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{MonitorConfig, ProxyConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one provider must be configured")]
    NoProviders,

    #[error("duplicate provider id '{0}'")]
    DuplicateProvider(String),

    #[error("provider '{id}' has invalid url '{url}'")]
    InvalidProviderUrl { id: String, url: String },

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("min_backoff_secs ({min}) exceeds max_backoff_secs ({max})")]
    BackoffRange { min: u64, max: u64 },

    #[error("provider timeouts total {chain_secs}s, not below timeouts.request_secs ({request_secs}s)")]
    ChainExceedsRequestTimeout { chain_secs: u64, request_secs: u64 },
}

pub fn validate_proxy_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.providers.is_empty() {
        errors.push(ValidationError::NoProviders);
    }

    let mut seen = HashSet::new();
    for provider in &config.providers {
        if !seen.insert(provider.id.as_str()) {
            errors.push(ValidationError::DuplicateProvider(provider.id.clone()));
        }
        let valid_url = Url::parse(&provider.url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid_url {
            errors.push(ValidationError::InvalidProviderUrl {
                id: provider.id.clone(),
                url: provider.url.clone(),
            });
        }
        if provider.timeout_secs == 0 {
            errors.push(ValidationError::MustBePositive("providers.timeout_secs"));
        }
    }

    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::MustBePositive("breaker.failure_threshold"));
    }
    if config.breaker.reset_timeout_secs == 0 {
        errors.push(ValidationError::MustBePositive("breaker.reset_timeout_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::MustBePositive("timeouts.request_secs"));
    }

    // A walk over the whole chain must finish before the request deadline.
    let chain_secs = config
        .providers
        .iter()
        .fold(0u64, |total, p| total.saturating_add(p.timeout_secs));
    if !config.providers.is_empty() && chain_secs >= config.timeouts.request_secs {
        errors.push(ValidationError::ChainExceedsRequestTimeout {
            chain_secs,
            request_secs: config.timeouts.request_secs,
        });
    }
    if config.events.subscriber_buffer == 0 {
        errors.push(ValidationError::MustBePositive("events.subscriber_buffer"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_monitor_config(config: &MonitorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let positive = [
        ("poll_interval_secs", config.poll_interval_secs),
        ("http_timeout_secs", config.http_timeout_secs),
        ("idle_timeout_secs", config.idle_timeout_secs),
        ("min_backoff_secs", config.min_backoff_secs),
        ("max_backoff_secs", config.max_backoff_secs),
    ];
    for (name, value) in positive {
        if value == 0 {
            errors.push(ValidationError::MustBePositive(name));
        }
    }

    if config.min_backoff_secs > config.max_backoff_secs {
        errors.push(ValidationError::BackoffRange {
            min: config.min_backoff_secs,
            max: config.max_backoff_secs,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
