use super::apply_headers;
use crate::application::tooling::error::ToolInvokeError;
use crate::application::tooling::rpc::{self, Inbound, PendingRequests, SERVER_REPLY_TIMEOUT};
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Long-lived server-sent-events stream for responses plus a POST endpoint for requests.
pub struct SseTransport {
    server: String,
    http: Client,
    endpoint: Url,
    headers: BTreeMap<String, String>,
    pending: Arc<PendingRequests>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SseTransport {
    pub(crate) async fn open(
        server: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
        handshake_timeout: Duration,
    ) -> Result<Self, ToolInvokeError> {
        let connection_error = |message: String| ToolInvokeError::Connection {
            server: server.to_string(),
            message,
        };
        let base = Url::parse(url).map_err(|err| connection_error(err.to_string()))?;
        let http = Client::new();
        let request = apply_headers(
            http.get(base.clone()).header(ACCEPT, "text/event-stream"),
            headers,
        );
        let mut source =
            EventSource::new(request).map_err(|err| connection_error(err.to_string()))?;

        let endpoint =
            match timeout(handshake_timeout, wait_for_endpoint(&mut source, &base))
                .await
            {
                Ok(Ok(endpoint)) => endpoint,
                Ok(Err(message)) => {
                    source.close();
                    return Err(connection_error(message));
                }
                Err(_) => {
                    source.close();
                    return Err(connection_error(format!(
                        "no endpoint event within {}ms",
                        handshake_timeout.as_millis()
                    )));
                }
            };
        debug!(server, endpoint = %endpoint, "SSE endpoint announced");

        let pending = Arc::new(PendingRequests::new(server));
        let listener = SseListener {
            server: server.to_string(),
            http: http.clone(),
            endpoint: endpoint.clone(),
            headers: headers.clone(),
            pending: Arc::clone(&pending),
        };
        let handle = tokio::spawn(listener.run(source));

        Ok(Self {
            server: server.to_string(),
            http,
            endpoint,
            headers: headers.clone(),
            pending,
            reader: Mutex::new(Some(handle)),
        })
    }

    pub(crate) fn next_id(&self) -> String {
        self.pending.next_id()
    }

    pub(crate) async fn request(
        &self,
        id: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, ToolInvokeError> {
        let mut slot = self.pending.register(id);
        post_frame(
            &self.http,
            &self.endpoint,
            &self.headers,
            &rpc::request_frame(id, method, params),
            &self.server,
        )
        .await?;
        slot.wait().await
    }

    pub(crate) async fn notify(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        post_frame(
            &self.http,
            &self.endpoint,
            &self.headers,
            &rpc::notification_frame(method, params),
            &self.server,
        )
        .await
    }

    pub(crate) async fn close(&self) {
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.pending.fail_all();
    }
}

async fn wait_for_endpoint(source: &mut EventSource, base: &Url) -> Result<Url, String> {
    while let Some(event) = source.next().await {
        match event {
            Ok(Event::Open) => {}
            Ok(Event::Message(message)) if message.event == "endpoint" => {
                return base
                    .join(message.data.trim())
                    .map_err(|err| format!("invalid endpoint '{}': {err}", message.data));
            }
            Ok(Event::Message(message)) => {
                debug!(event = message.event.as_str(), "ignoring SSE event before endpoint");
            }
            Err(err) => return Err(err.to_string()),
        }
    }
    Err("event stream closed before endpoint event".to_string())
}

async fn post_frame(
    http: &Client,
    endpoint: &Url,
    headers: &BTreeMap<String, String>,
    frame: &Value,
    server: &str,
) -> Result<(), ToolInvokeError> {
    let response = apply_headers(http.post(endpoint.clone()).json(frame), headers)
        .send()
        .await
        .map_err(|err| ToolInvokeError::Transport {
            server: server.to_string(),
            message: err.to_string(),
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(ToolInvokeError::Transport {
            server: server.to_string(),
            message: format!("POST {endpoint} returned status {status}"),
        });
    }
    Ok(())
}

#[derive(Clone)]
struct SseListener {
    server: String,
    http: Client,
    endpoint: Url,
    headers: BTreeMap<String, String>,
    pending: Arc<PendingRequests>,
}

impl SseListener {
    async fn run(self, mut source: EventSource) {
        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) if message.event == "message" => {
                    match serde_json::from_str::<Value>(&message.data) {
                        Ok(value) => self.process_inbound_message(value).await,
                        Err(err) => warn!(
                            server = %self.server,
                            %err,
                            "received invalid JSON over SSE"
                        ),
                    }
                }
                Ok(Event::Message(message)) => {
                    debug!(
                        server = %self.server,
                        event = message.event.as_str(),
                        "ignoring SSE event"
                    );
                }
                Err(err) => {
                    warn!(server = %self.server, %err, "SSE stream failed");
                    break;
                }
            }
        }
        source.close();
        self.pending.fail_all();
    }

    async fn answer_server_request(&self, reply: Value) {
        let post = post_frame(&self.http, &self.endpoint, &self.headers, &reply, &self.server);
        match timeout(SERVER_REPLY_TIMEOUT, post).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(server = %self.server, %err, "failed to answer server request"),
            Err(_) => warn!(server = %self.server, "timed out answering server request"),
        }
    }

    async fn process_inbound_message(&self, value: Value) {
        match rpc::classify(value) {
            Inbound::Response { key, outcome } => self.pending.resolve(&key, outcome),
            Inbound::Request { id, method } => {
                // Answered off the listener so a hanging POST cannot stall correlation.
                let reply = rpc::reply_to_server_request(id, &method);
                let listener = self.clone();
                tokio::spawn(async move { listener.answer_server_request(reply).await });
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
}
