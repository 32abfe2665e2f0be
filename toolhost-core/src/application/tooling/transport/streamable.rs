use super::apply_headers;
use crate::application::tooling::error::ToolInvokeError;
use crate::application::tooling::rpc::{self, Inbound};
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::Value;
use std::collections::BTreeMap;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

const SESSION_HEADER: &str = "mcp-session-id";
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// One HTTP POST per JSON-RPC message; replies arrive as JSON or as an SSE-framed body.
pub struct StreamableHttpTransport {
    server: String,
    http: Client,
    url: Url,
    headers: BTreeMap<String, String>,
    session_id: Mutex<Option<String>>,
    id_counter: AtomicU64,
}

impl StreamableHttpTransport {
    pub(crate) fn new(
        server: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<Self, ToolInvokeError> {
        let url = Url::parse(url).map_err(|err| ToolInvokeError::Connection {
            server: server.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            server: server.to_string(),
            http: Client::new(),
            url,
            headers: headers.clone(),
            session_id: Mutex::new(None),
            id_counter: AtomicU64::new(1),
        })
    }

    pub(crate) fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }

    fn session_id(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_session(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = apply_headers(builder, &self.headers);
        match self.session_id() {
            Some(session) => builder.header(SESSION_HEADER, session),
            None => builder,
        }
    }

    fn transport_error(&self, message: impl Into<String>) -> ToolInvokeError {
        ToolInvokeError::Transport {
            server: self.server.clone(),
            message: message.into(),
        }
    }

    async fn post(&self, frame: &Value) -> Result<Response, ToolInvokeError> {
        let builder = self.with_session(
            self.http
                .post(self.url.clone())
                .header(ACCEPT, "application/json, text/event-stream")
                .json(frame),
        );
        let response = builder
            .send()
            .await
            .map_err(|err| self.transport_error(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.transport_error(format!("POST returned status {status}")));
        }
        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            *self
                .session_id
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(session.to_string());
        }
        Ok(response)
    }

    pub(crate) async fn request(
        &self,
        id: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, ToolInvokeError> {
        let response = self.post(&rpc::request_frame(id, method, params)).await?;
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("text/event-stream"));
        if !is_stream {
            let body = response
                .text()
                .await
                .map_err(|err| self.transport_error(err.to_string()))?;
            return self
                .correlate(id, &body)?
                .ok_or_else(|| self.transport_error(format!("no response for request '{id}'")));
        }

        // The server may keep the stream open after replying; stop reading at the reply.
        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| self.transport_error(err.to_string()))?;
            for payload in decoder.push(&chunk) {
                if let Some(result) = self.correlate(id, &payload)? {
                    return Ok(result);
                }
            }
        }
        if let Some(payload) = decoder.finish() {
            if let Some(result) = self.correlate(id, &payload)? {
                return Ok(result);
            }
        }
        Err(self.transport_error(format!("no response for request '{id}'")))
    }

    /// Matches one JSON-RPC payload against request `id`.
    fn correlate(&self, id: &str, raw: &str) -> Result<Option<Value>, ToolInvokeError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|source| ToolInvokeError::InvalidJson {
                server: self.server.clone(),
                source,
            })?;
        match rpc::classify(value) {
            Inbound::Response { key, outcome } if key == id => outcome
                .map(Some)
                .map_err(|(code, message)| ToolInvokeError::Rpc {
                    server: self.server.clone(),
                    code,
                    message,
                }),
            Inbound::Request { method, .. } | Inbound::Notification { method } => {
                debug!(
                    server = %self.server,
                    method = method.as_str(),
                    "ignoring server message inside response stream"
                );
                Ok(None)
            }
            Inbound::Response { .. } | Inbound::Ignored => Ok(None),
        }
    }

    pub(crate) async fn notify(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        self.post(&rpc::notification_frame(method, params))
            .await
            .map(|_| ())
    }

    /// Ends the server-side session, if one was assigned.
    pub(crate) async fn close(&self) {
        let Some(session) = self.session_id() else {
            return;
        };
        let request = self.with_session(self.http.delete(self.url.clone())).send();
        match tokio::time::timeout(CLOSE_TIMEOUT, request).await {
            Ok(Ok(response)) => {
                debug!(server = %self.server, session = session.as_str(), status = %response.status(), "session closed");
            }
            Ok(Err(err)) => warn!(server = %self.server, %err, "failed to close HTTP session"),
            Err(_) => warn!(server = %self.server, "timed out closing HTTP session"),
        }
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Incremental SSE parser yielding the joined `data:` lines of each completed event.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(payload) = self.accept_line(line.trim_end_matches(['\n', '\r'])) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flushes a final event that was not followed by a blank line.
    fn finish(mut self) -> Option<String> {
        let rest = mem::take(&mut self.buffer);
        if !rest.is_empty() {
            let line = String::from_utf8_lossy(&rest);
            self.accept_line(line.trim_end_matches('\r'));
        }
        self.flush()
    }

    fn accept_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.flush();
        }
        if let Some(data) = line.strip_prefix("data:") {
            self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
        None
    }

    fn flush(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(body: &str) -> Vec<String> {
        let mut decoder = SseDecoder::default();
        let mut payloads = decoder.push(body.as_bytes());
        payloads.extend(decoder.finish());
        payloads
    }

    #[test]
    fn splits_sse_body_into_payloads() {
        let body = "event: message\ndata: {\"a\":1}\n\n: comment\ndata: {\"b\":\ndata: 2}\r\n\r\n";
        assert_eq!(
            decode_all(body),
            vec!["{\"a\":1}".to_string(), "{\"b\":\n2}".to_string()]
        );
    }

    #[test]
    fn trailing_event_without_blank_line_is_kept() {
        assert_eq!(decode_all("data: x"), vec!["x".to_string()]);
        assert!(decode_all("event: ping\n\n").is_empty());
    }

    #[test]
    fn events_complete_as_chunks_arrive() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: message\nda").is_empty());
        assert!(decoder.push(b"ta: {\"id\":1}\n").is_empty());
        assert_eq!(decoder.push(b"\n: keep-alive\n"), vec!["{\"id\":1}".to_string()]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn multibyte_text_split_across_chunks_survives() {
        let encoded = "data: é\n\n".as_bytes();
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&encoded[..7]).is_empty());
        assert_eq!(decoder.push(&encoded[7..]), vec!["é".to_string()]);
    }
}
