use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("failed to spawn tool server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to connect to tool server '{server}': {message}")]
    Connection { server: String, message: String },
    #[error("failed to list tools on server '{server}': {message}")]
    Discovery { server: String, message: String },
    #[error("tool server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("tool server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("tool server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("tool '{tool}' on server '{server}' timed out after {timeout_ms}ms")]
    Timeout {
        server: String,
        tool: String,
        timeout_ms: u64,
    },
    #[error("tool server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("tool server '{server}' request cancelled")]
    Cancelled { server: String },
}

impl ToolInvokeError {
    pub fn server(&self) -> &str {
        match self {
            ToolInvokeError::Spawn { server, .. }
            | ToolInvokeError::Connection { server, .. }
            | ToolInvokeError::Discovery { server, .. }
            | ToolInvokeError::Transport { server, .. }
            | ToolInvokeError::InvalidJson { server, .. }
            | ToolInvokeError::Rpc { server, .. }
            | ToolInvokeError::Timeout { server, .. }
            | ToolInvokeError::Terminated { server }
            | ToolInvokeError::Cancelled { server } => server,
        }
    }

    /// Re-labels a failure that happened while establishing a connection.
    pub(crate) fn into_connection(self) -> Self {
        match self {
            err @ (ToolInvokeError::Spawn { .. } | ToolInvokeError::Connection { .. }) => err,
            other => ToolInvokeError::Connection {
                server: other.server().to_string(),
                message: other.to_string(),
            },
        }
    }

    pub(crate) fn into_discovery(self) -> Self {
        match self {
            err @ ToolInvokeError::Discovery { .. } => err,
            other => ToolInvokeError::Discovery {
                server: other.server().to_string(),
                message: other.to_string(),
            },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolInvokeError::Timeout { .. })
    }
}
