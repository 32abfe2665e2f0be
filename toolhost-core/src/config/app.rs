use super::error::ConfigError;
use super::guardrails::GuardrailLimits;
use super::provider::ProviderConfig;
use super::runtime::RuntimeSettings;
use super::server::ServerDefinition;
use serde_json::Value;
use std::path::Path;

/// Everything one deployment of the agent runtime needs.
#[derive(Debug, Clone, Default)]
pub struct DeploymentConfig {
    pub provider: Option<ProviderConfig>,
    pub guardrails: GuardrailLimits,
    pub runtime: RuntimeSettings,
    pub servers: Vec<ServerDefinition>,
}

impl DeploymentConfig {
    /// Load configuration from a file path (or default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        super::loader::parse_toml(content, Path::new("<inline>"))
    }

    /// Build from the JSON document the surrounding application stores.
    pub fn from_json(value: Value) -> Result<Self, ConfigError> {
        super::loader::parse_json(value)
    }

    pub fn require_provider(&self) -> Result<&ProviderConfig, ConfigError> {
        self.provider.as_ref().ok_or(ConfigError::MissingProvider)
    }
}
