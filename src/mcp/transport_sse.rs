// SSE (Server-Sent Events) transport for MCP servers.
//
// The client opens a long-lived GET on the SSE URL. The server's first event
// is `endpoint`, whose data names the URL that accepts client messages as
// POSTs. Everything the server says afterwards arrives as `message` events.

use bytes::BytesMut;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL};
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use crate::error::{McpFlowError, Result};

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// Incremental event-stream decoder. Bytes are buffered until a full line is
/// available so multi-byte characters split across chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: BytesMut,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.split_to(line_end + 1);
            let text = String::from_utf8_lossy(&line[..line_end]).into_owned();
            let text = text.strip_suffix('\r').unwrap_or(&text);
            if let Some(event) = self.process_line(text) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(colon_pos) => {
                let value = &line[colon_pos + 1..];
                (&line[..colon_pos], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            // retry hints only matter for reconnecting clients
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
            id: self.last_id.clone(),
        })
    }
}

type EventResult = std::result::Result<SseEvent, String>;

pub struct SseTransport {
    http: reqwest::Client,
    headers: HeaderMap,
    message_url: Url,
    events: mpsc::UnboundedReceiver<EventResult>,
    reader: Option<JoinHandle<()>>,
}

impl SseTransport {
    /// Open the event stream and wait for the server to announce its message
    /// endpoint. The deadline bounds the wait for the `endpoint` event.
    pub async fn connect(url: &str, headers: HeaderMap, deadline: Instant) -> Result<Self> {
        let sse_url = Url::parse(url)
            .map_err(|e| McpFlowError::Connection(format!("invalid endpoint URL '{}': {}", url, e)))?;

        let connect_window = deadline.saturating_duration_since(Instant::now());
        let http = reqwest::Client::builder()
            .connect_timeout(connect_window.max(Duration::from_millis(1)))
            .build()
            .map_err(|e| McpFlowError::Connection(e.to_string()))?;

        let request = http
            .get(sse_url.clone())
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .headers(headers.clone());

        let response = match timeout_at(deadline, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(McpFlowError::Connection(format!(
                    "failed to reach {}: {}",
                    sse_url, e
                )))
            }
            Err(_) => {
                return Err(McpFlowError::Connection(format!(
                    "timed out connecting to {}",
                    sse_url
                )))
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = error_body(response, deadline).await;
            return Err(McpFlowError::Connection(format!(
                "{} returned HTTP {}: {}",
                sse_url, status, body
            )));
        }

        let (tx, mut events) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut parser = SseParser::new();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        for event in parser.feed(&bytes) {
                            if tx.send(Ok(event)).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e.to_string()));
                        return;
                    }
                }
            }
        });

        let message_url = match timeout_at(deadline, wait_for_endpoint(&mut events, &sse_url)).await
        {
            Ok(Ok(message_url)) => message_url,
            Ok(Err(e)) => {
                reader.abort();
                return Err(e);
            }
            Err(_) => {
                reader.abort();
                return Err(McpFlowError::Handshake(format!(
                    "{} did not announce a message endpoint in time",
                    sse_url
                )));
            }
        };

        Ok(Self {
            http,
            headers,
            message_url,
            events,
            reader: Some(reader),
        })
    }

    pub fn message_url(&self) -> &Url {
        &self.message_url
    }

    /// POST one JSON-RPC message to the server's message endpoint. Callers
    /// bound the post itself; `deadline` caps reading an error body.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T, deadline: Instant) -> Result<()> {
        let response = self
            .http
            .post(self.message_url.clone())
            .headers(self.headers.clone())
            .json(message)
            .send()
            .await
            .map_err(|e| McpFlowError::Connection(format!("failed to post message: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = error_body(response, deadline).await;
            return Err(McpFlowError::Protocol(format!(
                "server rejected message (HTTP {}): {}",
                status, body
            )));
        }
        Ok(())
    }

    /// Next event from the stream; `None` once the stream has ended.
    pub async fn recv(&mut self) -> Result<Option<SseEvent>> {
        match self.events.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(e)) => Err(McpFlowError::Connection(format!("event stream failed: {}", e))),
            None => Ok(None),
        }
    }

    /// Stop the reader task and drop the stream. Safe to call repeatedly.
    pub async fn close(&mut self) -> std::result::Result<(), String> {
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };
        self.events.close();
        stop_reader(reader).await
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn stop_reader(reader: JoinHandle<()>) -> std::result::Result<(), String> {
    reader.abort();
    match reader.await {
        Err(e) if e.is_panic() => Err(format!("event reader panicked: {}", e)),
        _ => Ok(()),
    }
}

/// Whatever error body arrives before `deadline`; servers may stream it forever.
async fn error_body(response: reqwest::Response, deadline: Instant) -> String {
    match timeout_at(deadline, response.text()).await {
        Ok(Ok(body)) => body.trim().to_string(),
        _ => String::new(),
    }
}

async fn wait_for_endpoint(
    events: &mut mpsc::UnboundedReceiver<EventResult>,
    sse_url: &Url,
) -> Result<Url> {
    while let Some(event) = events.recv().await {
        let event = event
            .map_err(|e| McpFlowError::Connection(format!("event stream failed: {}", e)))?;
        if event.event != "endpoint" {
            continue;
        }
        return sse_url.join(event.data.trim()).map_err(|e| {
            McpFlowError::Protocol(format!("invalid message endpoint '{}': {}", event.data, e))
        });
    }
    Err(McpFlowError::Connection(format!(
        "{} closed the event stream before announcing a message endpoint",
        sse_url
    )))
}

#[cfg(test)]
impl SseTransport {
    /// A transport with no server behind it, owning `reader`.
    pub(crate) fn detached(reader: JoinHandle<()>) -> Self {
        let (_tx, events) = mpsc::unbounded_channel();
        Self {
            http: reqwest::Client::new(),
            headers: HeaderMap::new(),
            message_url: Url::parse("http://127.0.0.1/messages").expect("static url"),
            events,
            reader: Some(reader),
        }
    }
}
