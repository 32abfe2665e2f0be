use super::error::ToolInvokeError;
use super::rpc;
use super::transport::Transport;
use crate::config::ServerDefinition;
use crate::domain::types::ExecutableTool;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const MAX_DISCOVERY_PAGES: usize = 32;
const CANCEL_NOTICE_TIMEOUT: Duration = Duration::from_secs(2);

/// Text extracted from a `tools/call` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutput {
    pub text: String,
    pub is_error: bool,
}

impl CallOutput {
    fn from_result(result: &Value) -> Self {
        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let blocks = result
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|block| block.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let text = if blocks.is_empty() {
            result
                .get("structuredContent")
                .map(Value::to_string)
                .unwrap_or_default()
        } else {
            blocks.join("\n")
        };
        Self { text, is_error }
    }
}

/// One live, initialized connection to one tool server.
pub struct ToolServerConnection {
    name: String,
    transport: Transport,
    instructions: Option<String>,
}

impl ToolServerConnection {
    /// Opens the transport and performs the `initialize` handshake within `handshake_timeout`.
    pub async fn connect(
        definition: &ServerDefinition,
        handshake_timeout: Duration,
    ) -> Result<Self, ToolInvokeError> {
        let name = definition.name.as_str();
        let transport = Transport::open(name, &definition.transport, handshake_timeout)
            .await
            .map_err(ToolInvokeError::into_connection)?;

        let handshake = async {
            let id = transport.next_id();
            let init = transport
                .request(&id, "initialize", rpc::initialize_params())
                .await?;
            transport
                .notify("notifications/initialized", json!({}))
                .await?;
            Ok::<Value, ToolInvokeError>(init)
        };
        let outcome = timeout(handshake_timeout, handshake).await;
        let init = match outcome {
            Ok(Ok(init)) => init,
            Ok(Err(err)) => {
                transport.close().await;
                return Err(err.into_connection());
            }
            Err(_) => {
                transport.close().await;
                return Err(ToolInvokeError::Connection {
                    server: name.to_string(),
                    message: format!(
                        "initialize timed out after {}ms",
                        handshake_timeout.as_millis()
                    ),
                });
            }
        };

        let instructions = init
            .get("instructions")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        info!(
            server = name,
            transport = definition.transport.kind().as_str(),
            allow_network = definition.sandbox.allow_network,
            allow_filesystem = definition.sandbox.allow_filesystem,
            "connected to tool server"
        );

        Ok(Self {
            name: name.to_string(),
            transport,
            instructions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    /// Fetches the full tool catalog, following pagination cursors.
    pub async fn list_tools(
        &self,
        request_timeout: Duration,
    ) -> Result<Vec<ExecutableTool>, ToolInvokeError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_DISCOVERY_PAGES {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let id = self.transport.next_id();
            let page = timeout(
                request_timeout,
                self.transport.request(&id, "tools/list", params),
            )
            .await
            .map_err(|_| ToolInvokeError::Discovery {
                server: self.name.clone(),
                message: format!(
                    "tools/list timed out after {}ms",
                    request_timeout.as_millis()
                ),
            })?
            .map_err(ToolInvokeError::into_discovery)?;

            tools.extend(self.parse_tools(&page));
            cursor = page
                .get("nextCursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        if cursor.is_some() {
            warn!(
                server = %self.name,
                pages = MAX_DISCOVERY_PAGES,
                count = tools.len(),
                "tool discovery stopped at the page limit; catalog is incomplete"
            );
        }

        debug!(server = %self.name, count = tools.len(), "discovered tools");
        Ok(tools)
    }

    fn parse_tools(&self, page: &Value) -> Vec<ExecutableTool> {
        let Some(array) = page.get("tools").and_then(Value::as_array) else {
            return Vec::new();
        };
        array
            .iter()
            .filter_map(|tool| {
                let name = tool.get("name").and_then(Value::as_str)?;
                Some(ExecutableTool {
                    name: name.to_string(),
                    description: tool
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    input_schema: tool
                        .get("inputSchema")
                        .cloned()
                        .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
                    server: self.name.clone(),
                })
            })
            .collect()
    }

    /// Calls one tool, racing the call against `deadline`.
    ///
    /// On expiry the in-flight request is abandoned, a cancellation notice is
    /// sent, and the connection stays usable.
    pub async fn invoke(
        &self,
        tool: &str,
        input: Value,
        deadline: Duration,
    ) -> Result<CallOutput, ToolInvokeError> {
        let params = json!({
            "name": tool,
            "arguments": match input {
                Value::Null => json!({}),
                other => other,
            }
        });
        let id = self.transport.next_id();
        let call = self.transport.request(&id, "tools/call", params);

        match timeout(deadline, call).await {
            Ok(result) => result.map(|value| CallOutput::from_result(&value)),
            Err(_) => {
                self.send_cancellation(&id).await;
                Err(ToolInvokeError::Timeout {
                    server: self.name.clone(),
                    tool: tool.to_string(),
                    timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    async fn send_cancellation(&self, request_id: &str) {
        let notice = self.transport.notify(
            "notifications/cancelled",
            rpc::cancelled_params(request_id, "timeout"),
        );
        match timeout(CANCEL_NOTICE_TIMEOUT, notice).await {
            Ok(Ok(())) => debug!(server = %self.name, request_id, "sent cancellation notice"),
            Ok(Err(err)) => {
                warn!(server = %self.name, request_id, %err, "failed to send cancellation notice");
            }
            Err(_) => warn!(server = %self.name, request_id, "cancellation notice timed out"),
        }
    }

    /// Releases transport resources. Never fails.
    pub async fn close(&self) {
        self.transport.close().await;
        debug!(server = %self.name, "closed tool server connection");
    }
}
