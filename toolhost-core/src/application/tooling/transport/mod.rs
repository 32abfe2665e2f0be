//! The three ways a tool server can be reached.

mod sse;
mod stdio;
mod streamable;

pub use sse::SseTransport;
pub use stdio::StdioTransport;
pub use streamable::StreamableHttpTransport;

use super::error::ToolInvokeError;
use crate::config::TransportConfig;
use reqwest::RequestBuilder;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use stdio::StdioSpec;

pub enum Transport {
    Stdio(StdioTransport),
    Sse(SseTransport),
    StreamableHttp(StreamableHttpTransport),
}

impl Transport {
    pub(crate) async fn open(
        server: &str,
        config: &TransportConfig,
        handshake_timeout: Duration,
    ) -> Result<Self, ToolInvokeError> {
        match config {
            TransportConfig::Stdio {
                command,
                args,
                env,
                workdir,
            } => StdioTransport::spawn(
                server,
                StdioSpec {
                    command,
                    args,
                    env,
                    workdir: workdir.as_ref(),
                },
            )
            .map(Transport::Stdio),
            TransportConfig::Sse { url, headers } => {
                SseTransport::open(server, url, headers, handshake_timeout)
                    .await
                    .map(Transport::Sse)
            }
            TransportConfig::StreamableHttp { url, headers } => {
                StreamableHttpTransport::new(server, url, headers).map(Transport::StreamableHttp)
            }
        }
    }

    pub(crate) fn next_id(&self) -> String {
        match self {
            Transport::Stdio(inner) => inner.next_id(),
            Transport::Sse(inner) => inner.next_id(),
            Transport::StreamableHttp(inner) => inner.next_id(),
        }
    }

    pub(crate) async fn request(
        &self,
        id: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, ToolInvokeError> {
        match self {
            Transport::Stdio(inner) => inner.request(id, method, params).await,
            Transport::Sse(inner) => inner.request(id, method, params).await,
            Transport::StreamableHttp(inner) => inner.request(id, method, params).await,
        }
    }

    pub(crate) async fn notify(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        match self {
            Transport::Stdio(inner) => inner.notify(method, params).await,
            Transport::Sse(inner) => inner.notify(method, params).await,
            Transport::StreamableHttp(inner) => inner.notify(method, params).await,
        }
    }

    pub(crate) async fn close(&self) {
        match self {
            Transport::Stdio(inner) => inner.close().await,
            Transport::Sse(inner) => inner.close().await,
            Transport::StreamableHttp(inner) => inner.close().await,
        }
    }
}

fn apply_headers(builder: RequestBuilder, headers: &BTreeMap<String, String>) -> RequestBuilder {
    headers
        .iter()
        .fold(builder, |builder, (key, value)| builder.header(key, value))
}
