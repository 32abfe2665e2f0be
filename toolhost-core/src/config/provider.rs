use serde::{Deserialize, Serialize};

/// Chat-completion provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_path: Option<String>,
}
