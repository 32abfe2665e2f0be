//! Provider factory - creates clients from config

use super::clients::OpenAICompatClient;
use super::traits::ChatCompletion;
use crate::config::ProviderConfig;
use std::env;
use std::sync::Arc;
use tracing::warn;

/// Resolve API key from the environment variable named in config.
pub fn resolve_api_key(provider: &str, spec: Option<&str>) -> Option<String> {
    let raw = spec.map(str::trim)?;
    if raw.is_empty() {
        return None;
    }
    match env::var(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                provider,
                env_var = raw,
                %err,
                "API key environment variable is not set"
            );
            None
        }
    }
}

pub struct ProviderFactory;

impl ProviderFactory {
    /// Every configured provider speaks the OpenAI-compatible chat format.
    pub fn create(config: &ProviderConfig) -> Arc<dyn ChatCompletion> {
        Arc::new(OpenAICompatClient::from_config(config))
    }
}
