use crate::application::tooling::error::ToolInvokeError;
use crate::application::tooling::rpc::{self, Inbound, PendingRequests, SERVER_REPLY_TIMEOUT};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

pub(crate) struct StdioSpec<'a> {
    pub command: &'a Path,
    pub args: &'a [String],
    pub env: &'a HashMap<String, String>,
    pub workdir: Option<&'a PathBuf>,
}

/// A tool server running as a child process, spoken to over newline-delimited JSON-RPC.
pub struct StdioTransport {
    inner: Arc<StdioInner>,
}

struct StdioInner {
    server: String,
    child: AsyncMutex<Option<Child>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: PendingRequests,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl StdioTransport {
    pub(crate) fn spawn(server: &str, spec: StdioSpec<'_>) -> Result<Self, ToolInvokeError> {
        let mut command = Command::new(spec.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = spec.workdir {
            command.current_dir(dir);
        }
        if !spec.args.is_empty() {
            command.args(spec.args);
        }
        for (key, value) in spec.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| ToolInvokeError::Spawn {
            server: server.to_string(),
            source,
        })?;

        let transport_error = |message: &str| ToolInvokeError::Transport {
            server: server.to_string(),
            message: message.to_string(),
        };
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| transport_error("failed to capture server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| transport_error("failed to capture server stdout"))?;

        let inner = Arc::new(StdioInner {
            server: server.to_string(),
            child: AsyncMutex::new(Some(child)),
            writer: AsyncMutex::new(Some(BufWriter::new(stdin))),
            pending: PendingRequests::new(server),
            reader: Mutex::new(None),
        });

        let reader_self = Arc::clone(&inner);
        let handle = tokio::spawn(async move {
            reader_self.reader_loop(stdout).await;
        });
        *inner.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Ok(Self { inner })
    }

    pub(crate) fn next_id(&self) -> String {
        self.inner.pending.next_id()
    }

    pub(crate) async fn request(
        &self,
        id: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, ToolInvokeError> {
        let mut slot = self.inner.pending.register(id);
        self.inner
            .write_message(&rpc::request_frame(id, method, params))
            .await?;
        slot.wait().await
    }

    pub(crate) async fn notify(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        self.inner
            .write_message(&rpc::notification_frame(method, params))
            .await
    }

    pub(crate) async fn close(&self) {
        if let Some(handle) = self
            .inner
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.inner.shutdown().await;
    }
}

impl StdioInner {
    async fn reader_loop(self: Arc<Self>, stdout: ChildStdout) {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            let raw = match lines.next_line().await {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(err) => {
                    warn!(server = %self.server, %err, "failed to read from tool server");
                    break;
                }
            };
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('\u{1b}') {
                debug!(
                    server = %self.server,
                    line = trimmed,
                    "skipping non-JSON ANSI log line from tool server"
                );
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => self.process_inbound_message(value).await,
                Err(source) => {
                    warn!(
                        server = %self.server,
                        line = trimmed,
                        %source,
                        "received invalid JSON from tool server"
                    );
                }
            }
        }

        debug!(server = %self.server, "tool server output closed");
        self.writer.lock().await.take();
        self.pending.fail_all();
    }

    async fn process_inbound_message(self: &Arc<Self>, value: Value) {
        match rpc::classify(value) {
            Inbound::Response { key, outcome } => self.pending.resolve(&key, outcome),
            Inbound::Request { id, method } => {
                if method != "ping" {
                    warn!(
                        server = %self.server,
                        method = method.as_str(),
                        "server sent unsupported request"
                    );
                }
                // Answered off the read loop so a full stdin pipe cannot stall responses.
                let reply = rpc::reply_to_server_request(id, &method);
                let inner = Arc::clone(self);
                tokio::spawn(async move { inner.answer_server_request(reply).await });
            }
            Inbound::Notification { method } => {
                debug!(
                    server = %self.server,
                    method = method.as_str(),
                    "received notification from server"
                );
            }
            Inbound::Ignored => {}
        }
    }

    async fn answer_server_request(&self, reply: Value) {
        match timeout(SERVER_REPLY_TIMEOUT, self.write_message(&reply)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(server = %self.server, %err, "failed to answer server request"),
            Err(_) => warn!(server = %self.server, "timed out answering server request"),
        }
    }

    async fn write_message(&self, message: &Value) -> Result<(), ToolInvokeError> {
        let encoded =
            serde_json::to_string(message).map_err(|source| ToolInvokeError::InvalidJson {
                server: self.server.clone(),
                source,
            })?;

        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or_else(|| ToolInvokeError::Terminated {
            server: self.server.clone(),
        })?;
        let transport = |source: std::io::Error| ToolInvokeError::Transport {
            server: self.server.clone(),
            message: source.to_string(),
        };
        stream.write_all(encoded.as_bytes()).await.map_err(transport)?;
        stream.write_all(b"\n").await.map_err(transport)?;
        stream.flush().await.map_err(transport)?;
        Ok(())
    }

    async fn shutdown(&self) {
        self.writer.lock().await.take();

        let mut child = self.child.lock().await;
        if let Some(mut running) = child.take() {
            if let Err(err) = running.kill().await {
                debug!(
                    server = %self.server,
                    %err,
                    "failed to kill tool server process (may have already exited)"
                );
            }
        }
        drop(child);

        self.pending.fail_all();
    }
}
