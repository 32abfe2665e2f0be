use super::connection::ToolServerConnection;
use crate::config::ServerDefinition;
use crate::domain::types::{
    ExecutableTool, NAMESPACE_SEPARATOR, ToolCall, ToolDefinition, ToolResult, split_qualified,
};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
pub const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Outcome of one [`ToolRegistry::connect`] batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectReport {
    pub connected: Vec<String>,
    pub failed: Vec<ServerFailure>,
    /// Definitions skipped because their status is inactive.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFailure {
    pub server: String,
    pub reason: String,
}

struct ConnectedServer {
    definition: ServerDefinition,
    connection: ToolServerConnection,
}

#[derive(Default)]
struct RegistryState {
    servers: BTreeMap<String, Arc<ConnectedServer>>,
    catalog: Option<Arc<Vec<ExecutableTool>>>,
    /// Bumped whenever `servers` is replaced so stale discoveries are not cached.
    generation: u64,
}

/// Aggregates independent tool-server connections behind one namespaced catalog.
pub struct ToolRegistry {
    state: RwLock<RegistryState>,
    handshake_timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Bound applied to connecting, initializing and listing tools.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Connects every active definition concurrently. Failures are isolated per server.
    ///
    /// The previous connection set is replaced in one step and then closed;
    /// the tool cache is invalidated.
    pub async fn connect(&self, definitions: &[ServerDefinition]) -> ConnectReport {
        let mut report = ConnectReport::default();
        let (active, inactive): (Vec<&ServerDefinition>, Vec<&ServerDefinition>) =
            definitions.iter().partition(|definition| definition.is_active());
        report.skipped = inactive
            .into_iter()
            .map(|definition| definition.name.clone())
            .collect();

        let handshake_timeout = self.handshake_timeout;
        let attempts = join_all(active.into_iter().map(|definition| async move {
            let outcome = ToolServerConnection::connect(definition, handshake_timeout).await;
            (definition, outcome)
        }))
        .await;

        let mut servers = BTreeMap::new();
        let mut duplicates = Vec::new();
        for (definition, outcome) in attempts {
            match outcome {
                Ok(connection) if servers.contains_key(&definition.name) => {
                    duplicates.push(connection);
                    report.failed.push(ServerFailure {
                        server: definition.name.clone(),
                        reason: "duplicate server name".to_string(),
                    });
                }
                Ok(connection) => {
                    report.connected.push(definition.name.clone());
                    servers.insert(
                        definition.name.clone(),
                        Arc::new(ConnectedServer {
                            definition: definition.clone(),
                            connection,
                        }),
                    );
                }
                Err(err) => {
                    warn!(server = %definition.name, %err, "failed to connect to tool server");
                    report.failed.push(ServerFailure {
                        server: definition.name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let replaced = {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.catalog = None;
            mem::replace(&mut state.servers, servers)
        };
        join_all(duplicates.iter().map(ToolServerConnection::close)).await;
        close_all(replaced.into_values()).await;

        info!(
            connected = report.connected.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "tool server batch connected"
        );
        report
    }

    pub async fn connected_servers(&self) -> Vec<String> {
        self.state.read().await.servers.keys().cloned().collect()
    }

    /// Instructions each connected server returned from `initialize`.
    pub async fn server_instructions(&self) -> Vec<(String, String)> {
        self.state
            .read()
            .await
            .servers
            .iter()
            .filter_map(|(name, server)| {
                server
                    .connection
                    .instructions()
                    .map(|text| (name.clone(), text.to_string()))
            })
            .collect()
    }

    /// The filtered catalog of every connected server. Cached until the next `connect`.
    pub async fn list_tools(&self) -> Vec<ExecutableTool> {
        let (servers, generation) = {
            let state = self.state.read().await;
            if let Some(catalog) = &state.catalog {
                return catalog.as_ref().clone();
            }
            (
                state.servers.values().cloned().collect::<Vec<_>>(),
                state.generation,
            )
        };

        let request_timeout = self.handshake_timeout;
        let discovered = join_all(servers.iter().map(|server| async move {
            match server.connection.list_tools(request_timeout).await {
                Ok(tools) => filter_tools(&server.definition, tools),
                Err(err) => {
                    warn!(
                        server = %server.definition.name,
                        %err,
                        "tool discovery failed; server contributes no tools"
                    );
                    Vec::new()
                }
            }
        }))
        .await;
        let catalog: Vec<ExecutableTool> = discovered.into_iter().flatten().collect();

        let mut state = self.state.write().await;
        if state.generation == generation {
            state.catalog = Some(Arc::new(catalog.clone()));
        } else {
            debug!("connection set changed during discovery; not caching catalog");
        }
        catalog
    }

    /// Catalog projected into the chat service's tool shape.
    pub async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        to_external_tool_schema(&self.list_tools().await)
    }

    /// Runs one call under the owning server's sandbox policy. Always yields a result.
    pub async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        let started = Instant::now();
        let elapsed_ms = || u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let Some((server_name, tool_name)) = resolve_target(call) else {
            return ToolResult::error(
                &call.id,
                format!("Cannot resolve a server for tool '{}'", call.name),
                elapsed_ms(),
            );
        };
        let server = self.state.read().await.servers.get(server_name).cloned();
        let Some(server) = server else {
            return ToolResult::error(
                &call.id,
                format!("Server '{server_name}' is not connected"),
                elapsed_ms(),
            );
        };
        if !server.definition.permits(tool_name) {
            return ToolResult::error(
                &call.id,
                format!("Tool '{tool_name}' is not permitted on server '{server_name}'"),
                elapsed_ms(),
            );
        }

        let sandbox = server.definition.sandbox;
        let outcome = server
            .connection
            .invoke(tool_name, call.input.clone(), sandbox.execution_timeout())
            .await;
        let (content, is_error) = match outcome {
            Ok(output) => (output.text, output.is_error),
            Err(err) if err.is_timeout() => (
                format!(
                    "Tool execution timed out after {}ms",
                    sandbox.max_execution_ms
                ),
                true,
            ),
            Err(err) => (format!("Tool execution failed: {err}"), true),
        };

        let result = ToolResult {
            call_id: call.id.clone(),
            content: truncate_output(content, sandbox.max_output_size),
            is_error,
            elapsed_ms: elapsed_ms(),
        };
        info!(
            server = server_name,
            tool = tool_name,
            elapsed_ms = result.elapsed_ms,
            is_error = result.is_error,
            "tool call finished"
        );
        result
    }

    /// Closes every connection concurrently and clears all state.
    pub async fn disconnect(&self) {
        let servers = {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.catalog = None;
            mem::take(&mut state.servers)
        };
        let count = servers.len();
        close_all(servers.into_values()).await;
        info!(count, "disconnected tool servers");
    }
}

async fn close_all(servers: impl IntoIterator<Item = Arc<ConnectedServer>>) {
    join_all(
        servers
            .into_iter()
            .map(|server| async move { server.connection.close().await }),
    )
    .await;
}

/// Keeps the tools passing the server's allow-list, then drops those on its deny-list.
pub fn filter_tools(definition: &ServerDefinition, tools: Vec<ExecutableTool>) -> Vec<ExecutableTool> {
    tools
        .into_iter()
        .filter(|tool| definition.permits(&tool.name))
        .collect()
}

pub fn to_external_tool_schema(tools: &[ExecutableTool]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|tool| ToolDefinition {
            name: tool.qualified_name(),
            description: tool.description.clone(),
            parameters: tool.input_schema.clone(),
        })
        .collect()
}

/// Server and bare tool name targeted by `call`.
///
/// An explicit server wins; otherwise the name is split at the first `__`.
pub fn resolve_target(call: &ToolCall) -> Option<(&str, &str)> {
    match call.server.as_deref().filter(|server| !server.is_empty()) {
        Some(server) => {
            let tool = call
                .name
                .strip_prefix(server)
                .and_then(|rest| rest.strip_prefix(NAMESPACE_SEPARATOR))
                .unwrap_or(&call.name);
            Some((server, tool))
        }
        None => split_qualified(&call.name),
    }
}

/// Cuts `text` to at most `limit` bytes on a char boundary and appends [`TRUNCATION_MARKER`].
pub fn truncate_output(text: String, limit: usize) -> String {
    if text.len() <= limit {
        return text;
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = text;
    truncated.truncate(cut);
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
