//! Building the provider chain from configuration.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::{ProviderConfig, ProviderKind};
use crate::providers::{
    HttpJsonProvider, Normalizer, PassthroughNormalizer, ProviderAdapter, ProviderError, WeatherApiNormalizer,
    WeatherstackNormalizer,
};

fn normalizer_for(kind: ProviderKind) -> Arc<dyn Normalizer> {
    match kind {
        ProviderKind::WeatherApi => Arc::new(WeatherApiNormalizer),
        ProviderKind::Weatherstack => Arc::new(WeatherstackNormalizer),
        ProviderKind::Passthrough => Arc::new(PassthroughNormalizer),
    }
}

/// Create one adapter from its configuration.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
    let endpoint = Url::parse(&config.url).map_err(|e| {
        ProviderError::TransportError(format!("invalid url for provider '{}': {}", config.id, e))
    })?;
    let provider = HttpJsonProvider::new(
        config.id.clone(),
        endpoint,
        config.api_key.clone(),
        Duration::from_secs(config.timeout_secs),
        normalizer_for(config.kind),
    )?;
    Ok(Arc::new(provider))
}

/// Create adapters for every configured provider, preserving chain order.
pub fn build_chain(configs: &[ProviderConfig]) -> Result<Vec<Arc<dyn ProviderAdapter>>, ProviderError> {
    configs.iter().map(build_provider).collect()
}
