use super::defaults::{DEFAULT_MAX_EXECUTION_MS, DEFAULT_MAX_OUTPUT_SIZE};
use super::error::ConfigError;
use crate::application::tooling::glob;
use crate::domain::types::NAMESPACE_SEPARATOR;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    #[default]
    Stdio,
    Sse,
    StreamableHttp,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Stdio => "stdio",
            TransportKind::Sse => "sse",
            TransportKind::StreamableHttp => "streamable-http",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    Stdio {
        command: PathBuf,
        args: Vec<String>,
        env: HashMap<String, String>,
        workdir: Option<PathBuf>,
    },
    Sse {
        url: String,
        headers: BTreeMap<String, String>,
    },
    StreamableHttp {
        url: String,
        headers: BTreeMap<String, String>,
    },
}

impl TransportConfig {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportConfig::Stdio { .. } => TransportKind::Stdio,
            TransportConfig::Sse { .. } => TransportKind::Sse,
            TransportConfig::StreamableHttp { .. } => TransportKind::StreamableHttp,
        }
    }
}

/// Execution limits the registry applies to every call routed to a server.
///
/// `allow_network` and `allow_filesystem` are recorded and logged at connect
/// time; enforcing them is left to the process that hosts the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxPolicy {
    pub max_execution_ms: u64,
    pub max_output_size: usize,
    pub allow_network: bool,
    pub allow_filesystem: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            max_execution_ms: DEFAULT_MAX_EXECUTION_MS,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            allow_network: false,
            allow_filesystem: false,
        }
    }
}

impl SandboxPolicy {
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.max_execution_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    #[default]
    Active,
    Inactive,
}

/// Static description of one tool server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDefinition {
    pub name: String,
    pub transport: TransportConfig,
    pub allowed_tools: Vec<String>,
    pub blocked_tools: Vec<String>,
    pub sandbox: SandboxPolicy,
    pub status: ServerStatus,
}

impl ServerDefinition {
    pub fn new(name: impl Into<String>, transport: TransportConfig) -> Self {
        Self {
            name: name.into(),
            transport,
            allowed_tools: Vec::new(),
            blocked_tools: Vec::new(),
            sandbox: SandboxPolicy::default(),
            status: ServerStatus::Active,
        }
    }

    pub fn stdio(name: impl Into<String>, command: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self::new(
            name,
            TransportConfig::Stdio {
                command: command.into(),
                args,
                env: HashMap::new(),
                workdir: None,
            },
        )
    }

    pub fn sse(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(
            name,
            TransportConfig::Sse {
                url: url.into(),
                headers: BTreeMap::new(),
            },
        )
    }

    pub fn streamable_http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(
            name,
            TransportConfig::StreamableHttp {
                url: url.into(),
                headers: BTreeMap::new(),
            },
        )
    }

    pub fn with_allowed_tools<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_blocked_tools<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_tools = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxPolicy) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_status(mut self, status: ServerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ServerStatus::Active
    }

    /// Allow-list first (empty allows everything), then the deny-list, which always wins.
    pub fn permits(&self, tool: &str) -> bool {
        let allowed = self.allowed_tools.is_empty() || glob::matches_any(&self.allowed_tools, tool);
        allowed && !glob::matches_any(&self.blocked_tools, tool)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawServer {
    name: String,
    #[serde(default)]
    transport: TransportKind,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    workdir: Option<String>,
    url: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    allowed_tools: Vec<String>,
    #[serde(default)]
    blocked_tools: Vec<String>,
    #[serde(default)]
    sandbox: SandboxPolicy,
    #[serde(default)]
    status: ServerStatus,
}

fn expand(value: &str) -> String {
    shellexpand::full(value)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    let reason = if name.trim().is_empty() {
        "name must not be empty"
    } else if name.contains(NAMESPACE_SEPARATOR) {
        "name must not contain '__'"
    } else {
        return Ok(());
    };
    Err(ConfigError::InvalidServerName {
        name: name.to_string(),
        reason,
    })
}

fn validated_url(server: &str, raw: Option<String>) -> Result<String, ConfigError> {
    let url = raw
        .map(|value| expand(&value))
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingUrl {
            server: server.to_string(),
        })?;
    Url::parse(&url).map_err(|_| ConfigError::InvalidUrl {
        server: server.to_string(),
        url: url.clone(),
    })?;
    Ok(url)
}

impl TryFrom<RawServer> for ServerDefinition {
    type Error = ConfigError;

    fn try_from(raw: RawServer) -> Result<Self, Self::Error> {
        validate_name(&raw.name)?;
        if raw.sandbox.max_execution_ms == 0 {
            return Err(ConfigError::InvalidLimit {
                field: "sandbox.max_execution_ms",
            });
        }
        if raw.sandbox.max_output_size == 0 {
            return Err(ConfigError::InvalidLimit {
                field: "sandbox.max_output_size",
            });
        }

        let transport = match raw.transport {
            TransportKind::Stdio => {
                let command = raw
                    .command
                    .map(|value| expand(&value))
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingCommand {
                        server: raw.name.clone(),
                    })?;
                TransportConfig::Stdio {
                    command: PathBuf::from(command),
                    args: raw.args.iter().map(|arg| expand(arg)).collect(),
                    env: raw.env,
                    workdir: raw.workdir.map(|dir| PathBuf::from(expand(&dir))),
                }
            }
            TransportKind::Sse => TransportConfig::Sse {
                url: validated_url(&raw.name, raw.url)?,
                headers: raw.headers,
            },
            TransportKind::StreamableHttp => TransportConfig::StreamableHttp {
                url: validated_url(&raw.name, raw.url)?,
                headers: raw.headers,
            },
        };

        Ok(Self {
            name: raw.name,
            transport,
            allowed_tools: raw.allowed_tools,
            blocked_tools: raw.blocked_tools,
            sandbox: raw.sandbox,
            status: raw.status,
        })
    }
}
