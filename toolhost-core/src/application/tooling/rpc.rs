//! JSON-RPC framing and request correlation shared by every transport.

use super::error::ToolInvokeError;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

pub(crate) const JSONRPC_VERSION: &str = "2.0";
pub(crate) const PROTOCOL_VERSION: &str = "2025-06-18";
const METHOD_NOT_FOUND: i64 = -32601;
/// Bound on delivering our answer to a server-initiated request.
pub(crate) const SERVER_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn request_frame(id: &str, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "method": method,
        "params": params,
    })
}

pub(crate) fn notification_frame(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": method,
        "params": params,
    })
}

pub(crate) fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {}
    })
}

pub(crate) fn cancelled_params(request_id: &str, reason: &str) -> Value {
    json!({ "requestId": request_id, "reason": reason })
}

/// Answer to a request the server sent us: `ping` is acknowledged, anything else is unsupported.
pub(crate) fn reply_to_server_request(id: Value, method: &str) -> Value {
    if method == "ping" {
        json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": {} })
    } else {
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "error": {
                "code": METHOD_NOT_FOUND,
                "message": format!("client does not implement method '{method}'"),
            }
        })
    }
}

pub(crate) enum Inbound {
    Response {
        key: String,
        outcome: Result<Value, (i64, String)>,
    },
    Request {
        id: Value,
        method: String,
    },
    Notification {
        method: String,
    },
    Ignored,
}

pub(crate) fn classify(value: Value) -> Inbound {
    let method = value
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_string);
    match (value.get("id").cloned(), method) {
        (Some(id), Some(method)) => Inbound::Request { id, method },
        (None, Some(method)) => Inbound::Notification { method },
        (Some(id), None) => {
            let Some(key) = response_key(&id) else {
                return Inbound::Ignored;
            };
            let outcome = match value.get("error") {
                Some(error) => Err((
                    error.get("code").and_then(Value::as_i64).unwrap_or(-32000),
                    error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                )),
                None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
            };
            Inbound::Response { key, outcome }
        }
        (None, None) => Inbound::Ignored,
    }
}

fn response_key(id: &Value) -> Option<String> {
    match id {
        Value::String(value) => Some(value.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

type Responder = oneshot::Sender<Result<Value, ToolInvokeError>>;

/// In-flight requests of one connection, keyed by JSON-RPC id.
pub(crate) struct PendingRequests {
    server: String,
    id_counter: AtomicU64,
    slots: Mutex<HashMap<String, Responder>>,
}

impl PendingRequests {
    pub(crate) fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            id_counter: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Responder>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves a slot for `id`. The slot is released when the returned handle drops.
    pub(crate) fn register(&self, id: &str) -> PendingSlot<'_> {
        let (tx, rx) = oneshot::channel();
        self.slots().insert(id.to_string(), tx);
        PendingSlot {
            pending: self,
            id: id.to_string(),
            rx,
        }
    }

    pub(crate) fn resolve(&self, key: &str, outcome: Result<Value, (i64, String)>) {
        let Some(sender) = self.slots().remove(key) else {
            debug!(
                server = %self.server,
                response_id = key,
                "received response for unknown request"
            );
            return;
        };
        let outcome = outcome.map_err(|(code, message)| ToolInvokeError::Rpc {
            server: self.server.clone(),
            code,
            message,
        });
        // The waiter may have timed out in the meantime.
        let _ = sender.send(outcome);
    }

    pub(crate) fn fail_all(&self) {
        let drained: Vec<Responder> = self.slots().drain().map(|(_, sender)| sender).collect();
        for sender in drained {
            let _ = sender.send(Err(ToolInvokeError::Terminated {
                server: self.server.clone(),
            }));
        }
    }

    fn release(&self, id: &str) {
        self.slots().remove(id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots().len()
    }
}

pub(crate) struct PendingSlot<'a> {
    pending: &'a PendingRequests,
    id: String,
    rx: oneshot::Receiver<Result<Value, ToolInvokeError>>,
}

impl PendingSlot<'_> {
    pub(crate) async fn wait(&mut self) -> Result<Value, ToolInvokeError> {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolInvokeError::Cancelled {
                server: self.pending.server.clone(),
            }),
        }
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.release(&self.id);
    }
}
