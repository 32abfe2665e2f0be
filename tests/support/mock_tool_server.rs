//! Minimal MCP tool server speaking newline-delimited JSON-RPC over stdio.
//!
//! Behaviour is tuned through environment variables:
//! - `MOCK_SILENT`: never answer anything
//! - `MOCK_INSTRUCTIONS`: instructions returned from `initialize`
//! - `MOCK_PAGE_SIZE`: split `tools/list` into pages of this size
//! - `MOCK_ENDLESS_CURSOR`: always return a `nextCursor`, wrapping around the catalog

use serde_json::{Value, json};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::Mutex;

const TOOLS: &[(&str, &str)] = &[
    ("echo", "Echo the `text` argument"),
    ("slow", "Sleep for `ms` milliseconds, then answer"),
    ("big", "Return `size` bytes of output"),
    ("fail", "Always report a tool error"),
    ("fs_read", "Read a file"),
    ("fs_write", "Write a file"),
    ("net_fetch", "Fetch a URL"),
];

type SharedStdout = Arc<Mutex<Stdout>>;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let silent = env::var_os("MOCK_SILENT").is_some();
    let stdout: SharedStdout = Arc::new(Mutex::new(tokio::io::stdout()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Servers commonly print a banner; clients must tolerate it.
    write_raw(&stdout, "mock-tool-server ready").await;

    while let Some(line) = lines.next_line().await? {
        if silent {
            continue;
        }
        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            eprintln!("mock-tool-server: ignoring invalid line");
            continue;
        };
        let Some(method) = message.get("method").and_then(Value::as_str) else {
            // Replies to our own requests (e.g. ping).
            continue;
        };
        let method = method.to_string();
        let Some(id) = message.get("id").cloned() else {
            if method == "notifications/initialized" {
                send(&stdout, json!({"jsonrpc": "2.0", "id": "srv-ping", "method": "ping"})).await;
            }
            eprintln!("mock-tool-server: notification {method}");
            continue;
        };
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let stdout = Arc::clone(&stdout);
        tokio::spawn(async move {
            let reply = match handle(&method, &params).await {
                Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
                Err((code, message)) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": code, "message": message}
                }),
            };
            send(&stdout, reply).await;
        });
    }
    Ok(())
}

async fn handle(method: &str, params: &Value) -> Result<Value, (i64, String)> {
    match method {
        "initialize" => {
            let mut result = json!({
                "protocolVersion": "2025-06-18",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "mock-tool-server", "version": "0.1.0"}
            });
            if let Ok(instructions) = env::var("MOCK_INSTRUCTIONS") {
                result["instructions"] = json!(instructions);
            }
            Ok(result)
        }
        "tools/list" => Ok(list_tools(params)),
        "tools/call" => call_tool(params).await,
        other => Err((-32601, format!("method '{other}' not found"))),
    }
}

fn list_tools(params: &Value) -> Value {
    let page_size = env::var("MOCK_PAGE_SIZE")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(TOOLS.len());
    let start = params
        .get("cursor")
        .and_then(Value::as_str)
        .and_then(|cursor| cursor.parse::<usize>().ok())
        .unwrap_or(0);
    let end = (start + page_size).min(TOOLS.len());
    let tools: Vec<Value> = TOOLS[start.min(end)..end]
        .iter()
        .map(|(name, description)| {
            json!({
                "name": name,
                "description": description,
                "inputSchema": {"type": "object", "properties": {}}
            })
        })
        .collect();
    let mut page = json!({ "tools": tools });
    if env::var_os("MOCK_ENDLESS_CURSOR").is_some() {
        page["nextCursor"] = json!((end % TOOLS.len()).to_string());
    } else if end < TOOLS.len() {
        page["nextCursor"] = json!(end.to_string());
    }
    page
}

async fn call_tool(params: &Value) -> Result<Value, (i64, String)> {
    let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
    let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let text = match name {
        "echo" => args.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
        "slow" => {
            let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(1_000);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            format!("slept {ms}ms")
        }
        "big" => {
            let size = args.get("size").and_then(Value::as_u64).unwrap_or(1_024);
            "x".repeat(usize::try_from(size).unwrap_or(1_024))
        }
        "fail" => {
            return Ok(json!({
                "content": [{"type": "text", "text": "tool reported failure"}],
                "isError": true
            }));
        }
        "fs_read" | "fs_write" | "net_fetch" => format!("{name} ok"),
        other => return Err((-32602, format!("unknown tool '{other}'"))),
    };
    Ok(json!({
        "content": [
            {"type": "text", "text": text},
            {"type": "image", "data": "AAAA", "mimeType": "image/png"}
        ]
    }))
}

async fn send(stdout: &SharedStdout, message: Value) {
    write_raw(stdout, &message.to_string()).await;
}

async fn write_raw(stdout: &SharedStdout, line: &str) {
    let mut out = stdout.lock().await;
    if out.write_all(line.as_bytes()).await.is_err() {
        return;
    }
    let _ = out.write_all(b"\n").await;
    let _ = out.flush().await;
}
