use super::app::DeploymentConfig;
use super::defaults::{DEFAULT_CONFIG_PATH, DEFAULT_ENV_PATH};
use super::error::ConfigError;
use super::guardrails::GuardrailLimits;
use super::provider::ProviderConfig;
use super::runtime::RuntimeSettings;
use super::server::{RawServer, ServerDefinition};
use dotenvy::from_filename;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Once;
use tracing::debug;

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure shared by the TOML and JSON forms
#[derive(Debug, Deserialize, Default)]
pub(super) struct RawConfig {
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub guardrails: GuardrailLimits,
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub servers: Vec<RawServer>,
}

/// Ensures environment variables are loaded from config/.env
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        if let Err(err) = from_filename(DEFAULT_ENV_PATH) {
            debug!(%err, "no .env file loaded");
        }
    });
}

/// Load and validate configuration from a file path
pub fn load_config(path: Option<&Path>) -> Result<DeploymentConfig, ConfigError> {
    ensure_env_loaded();
    let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    read_config(config_path)
}

fn read_config(path: &Path) -> Result<DeploymentConfig, ConfigError> {
    debug!(path = %path.display(), "Reading deployment configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    parse_toml(&content, path)
}

pub(super) fn parse_toml(content: &str, origin: &Path) -> Result<DeploymentConfig, ConfigError> {
    let parsed: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    validate_and_build(parsed)
}

pub(super) fn parse_json(value: Value) -> Result<DeploymentConfig, ConfigError> {
    let parsed: RawConfig = serde_json::from_value(value)?;
    validate_and_build(parsed)
}

fn validate_and_build(parsed: RawConfig) -> Result<DeploymentConfig, ConfigError> {
    if parsed.guardrails.max_turns_per_session == 0 {
        return Err(ConfigError::InvalidLimit {
            field: "guardrails.max_turns_per_session",
        });
    }
    if parsed.guardrails.escalation_threshold == 0 {
        return Err(ConfigError::InvalidLimit {
            field: "guardrails.escalation_threshold",
        });
    }
    if parsed.runtime.history_window == 0 {
        return Err(ConfigError::InvalidLimit {
            field: "runtime.history_window",
        });
    }

    let mut seen = HashSet::new();
    let mut servers = Vec::with_capacity(parsed.servers.len());
    for raw in parsed.servers {
        let definition = ServerDefinition::try_from(raw)?;
        if !seen.insert(definition.name.clone()) {
            return Err(ConfigError::DuplicateServer {
                name: definition.name,
            });
        }
        servers.push(definition);
    }

    Ok(DeploymentConfig {
        provider: parsed.provider,
        guardrails: parsed.guardrails,
        runtime: parsed.runtime,
        servers,
    })
}
