use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating a deployment configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server name '{name}' is invalid: {reason}")]
    InvalidServerName { name: String, reason: &'static str },

    #[error("server '{name}' is defined more than once")]
    DuplicateServer { name: String },

    #[error("stdio server '{server}' is missing required field 'command'")]
    MissingCommand { server: String },

    #[error("server '{server}' is missing required field 'url'")]
    MissingUrl { server: String },

    #[error("server '{server}' has an invalid url '{url}'")]
    InvalidUrl { server: String, url: String },

    #[error("'{field}' must be greater than zero")]
    InvalidLimit { field: &'static str },

    #[error("no [provider] section configured")]
    MissingProvider,
}
