use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

use super::endpoint::Endpoint;
use super::transport_sse::SseTransport;
use super::types::{
    InitializeResult, JsonRpcError, JsonRpcMessage, JsonRpcRequest, McpTool, McpToolResult,
    ServerInfo,
};
use crate::error::{McpFlowError, Result};
use crate::observer::{SessionEvent, SharedObserver};

// MCP Protocol constants
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const CLIENT_NAME: &str = "mcpflow";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Guards `tools/list` pagination against servers that repeat cursors.
const MAX_TOOL_PAGES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Active,
    Closed,
}

/// One initialized connection to a tool server. Single use: once closed it
/// rejects every operation with [`McpFlowError::NotConnected`].
pub struct Session {
    id: Uuid,
    endpoint: String,
    transport: SseTransport,
    timeout: Duration,
    next_id: u64,
    server_info: Option<ServerInfo>,
    observer: SharedObserver,
    state: SessionState,
}

impl Session {
    /// Open the event stream and run the initialize handshake. The endpoint's
    /// timeout covers everything from the first byte to the initialize reply.
    pub async fn connect(endpoint: &Endpoint, observer: SharedObserver) -> Result<Self> {
        let id = Uuid::new_v4();
        let started = Instant::now();
        observer.on_event(&SessionEvent::Connecting {
            session: id,
            endpoint: endpoint.url(),
        });

        match Self::establish(id, endpoint, observer.clone(), started).await {
            Ok(session) => {
                observer.on_event(&SessionEvent::Connected {
                    session: id,
                    endpoint: endpoint.url(),
                    server: session.server_info.as_ref(),
                    elapsed: started.elapsed(),
                });
                Ok(session)
            }
            Err(error) => {
                observer.on_event(&SessionEvent::ConnectFailed {
                    session: id,
                    endpoint: endpoint.url(),
                    error: &error,
                });
                Err(error)
            }
        }
    }

    async fn establish(
        id: Uuid,
        endpoint: &Endpoint,
        observer: SharedObserver,
        started: Instant,
    ) -> Result<Self> {
        let deadline = started + endpoint.timeout();
        let headers = endpoint.header_map()?;
        let transport = SseTransport::connect(endpoint.url(), headers, deadline).await?;

        let mut session = Session {
            id,
            endpoint: endpoint.url().to_string(),
            transport,
            timeout: endpoint.timeout(),
            next_id: 1,
            server_info: None,
            observer,
            state: SessionState::Active,
        };

        let init_params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": CLIENT_NAME,
                "version": CLIENT_VERSION
            }
        });

        let init_result = match session.request("initialize", Some(init_params), deadline).await {
            Ok(Ok(result)) => result,
            Ok(Err(rpc)) => {
                session.close().await;
                return Err(McpFlowError::Handshake(format!(
                    "server rejected initialize ({}): {}",
                    rpc.code, rpc.message
                )));
            }
            Err(McpFlowError::Timeout { after, .. }) => {
                session.close().await;
                return Err(McpFlowError::Handshake(format!(
                    "initialize did not complete within {:.1}s",
                    after.as_secs_f64()
                )));
            }
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        let init: InitializeResult = match serde_json::from_value(init_result) {
            Ok(init) => init,
            Err(e) => {
                session.close().await;
                return Err(McpFlowError::Handshake(format!(
                    "malformed initialize result: {}",
                    e
                )));
            }
        };
        session.server_info = init.server_info;

        let initialized = JsonRpcRequest::notification("notifications/initialized", None);
        let sent = timeout_at(deadline, session.transport.send(&initialized, deadline)).await;
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                session.close().await;
                return Err(e);
            }
            Err(_) => {
                session.close().await;
                return Err(McpFlowError::Handshake(format!(
                    "initialized notification not accepted within {:.1}s",
                    endpoint.timeout().as_secs_f64()
                )));
            }
        }

        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(McpFlowError::NotConnected)
        }
    }

    /// List every tool the server offers, following pagination cursors.
    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        self.ensure_active()?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();
        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let deadline = Instant::now() + self.timeout;
            let result = self.request("tools/list", params, deadline).await?.map_err(|rpc| {
                McpFlowError::Protocol(format!("tools/list failed ({}): {}", rpc.code, rpc.message))
            })?;

            let page = parse_tool_page(&result)?;
            for skipped in &page.skipped {
                self.observer.on_event(&SessionEvent::MessageSkipped {
                    session: self.id,
                    reason: skipped,
                });
            }
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
                _ => break,
            }
        }

        self.observer.on_event(&SessionEvent::ToolsListed {
            session: self.id,
            count: tools.len(),
        });
        Ok(tools)
    }

    /// Invoke one tool and wait for its result.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<McpToolResult> {
        self.ensure_active()?;

        let started = Instant::now();
        self.observer.on_event(&SessionEvent::ToolCallStarted {
            session: self.id,
            tool: name,
        });

        let outcome = self.call_tool_internal(name, arguments, started).await;

        self.observer.on_event(&SessionEvent::ToolCallFinished {
            session: self.id,
            tool: name,
            elapsed: started.elapsed(),
            error: outcome.as_ref().err(),
        });
        outcome
    }

    async fn call_tool_internal(
        &mut self,
        name: &str,
        arguments: Value,
        started: Instant,
    ) -> Result<McpToolResult> {
        let arguments = match arguments {
            Value::Null => json!({}),
            Value::Object(map) => Value::Object(map),
            other => {
                return Err(McpFlowError::Other(format!(
                    "Tool '{}' arguments must be a JSON object, got {}",
                    name, other
                )))
            }
        };

        let params = json!({
            "name": name,
            "arguments": arguments,
        });

        let deadline = started + self.timeout;
        let response = self.request("tools/call", Some(params), deadline).await?;
        let value = response.map_err(|rpc| McpFlowError::RemoteTool {
            tool: name.to_string(),
            message: rpc.message,
        })?;

        let result: McpToolResult = serde_json::from_value(value).map_err(|e| {
            McpFlowError::Protocol(format!("malformed result from tool '{}': {}", name, e))
        })?;

        if result.is_error() {
            return Err(McpFlowError::RemoteTool {
                tool: name.to_string(),
                message: result.joined_text(),
            });
        }
        Ok(result)
    }

    /// Send a request and wait for the response carrying its id. The outer
    /// result is transport trouble, the inner one a JSON-RPC error reply.
    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        deadline: Instant,
    ) -> Result<std::result::Result<Value, JsonRpcError>> {
        let id = self.next_id;
        self.next_id += 1;

        let exchanged = timeout_at(deadline, self.exchange(id, method, params, deadline)).await;
        match exchanged {
            Ok(outcome) => outcome,
            Err(_) => Err(McpFlowError::Timeout {
                method: method.to_string(),
                after: self.timeout,
            }),
        }
    }

    async fn exchange(
        &mut self,
        id: u64,
        method: &str,
        params: Option<Value>,
        deadline: Instant,
    ) -> Result<std::result::Result<Value, JsonRpcError>> {
        self.transport
            .send(&JsonRpcRequest::request(id, method, params), deadline)
            .await?;

        loop {
            let Some(event) = self.transport.recv().await? else {
                return Err(McpFlowError::Connection(format!(
                    "event stream closed while waiting for '{}'",
                    method
                )));
            };
            if event.event != "message" {
                continue;
            }

            let message: JsonRpcMessage = match serde_json::from_str(&event.data) {
                Ok(message) => message,
                Err(e) => {
                    let reason = format!("undecodable message: {}", e);
                    self.observer.on_event(&SessionEvent::MessageSkipped {
                        session: self.id,
                        reason: &reason,
                    });
                    continue;
                }
            };

            if message.is_response_to(id) {
                return Ok(match message.error {
                    Some(error) => Err(error),
                    None => Ok(message.result.unwrap_or(Value::Null)),
                });
            }

            match (message.method.as_deref(), message.id) {
                (Some("ping"), Some(ping_id)) => {
                    self.transport
                        .send(&json!({ "jsonrpc": "2.0", "id": ping_id, "result": {} }), deadline)
                        .await?;
                }
                (Some(other), _) => {
                    let reason = format!("unhandled server message '{}'", other);
                    self.observer.on_event(&SessionEvent::MessageSkipped {
                        session: self.id,
                        reason: &reason,
                    });
                }
                (None, other_id) => {
                    let reason = format!("response for unknown id {:?}", other_id);
                    self.observer.on_event(&SessionEvent::MessageSkipped {
                        session: self.id,
                        reason: &reason,
                    });
                }
            }
        }
    }

    /// Release the transport. Only the first call does anything; teardown
    /// failures go to the observer and are never returned.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;

        if let Err(error) = self.transport.close().await {
            self.observer.on_event(&SessionEvent::TeardownFailed {
                session: self.id,
                error: &error,
            });
        }
        self.observer.on_event(&SessionEvent::Closed {
            session: self.id,
            endpoint: &self.endpoint,
        });
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .finish()
    }
}

#[derive(Debug, Default)]
struct ToolPage {
    tools: Vec<McpTool>,
    skipped: Vec<String>,
    next_cursor: Option<String>,
}

/// Accepts `{"tools": [...]}`, a bare array, and `tools` nested inside
/// another `tools` object, which some servers produce.
fn parse_tool_page(result: &Value) -> Result<ToolPage> {
    fn tool_entries(value: &Value) -> Option<&Vec<Value>> {
        match value {
            Value::Array(items) => Some(items),
            Value::Object(map) => map.get("tools").and_then(tool_entries),
            _ => None,
        }
    }

    let entries = tool_entries(result).ok_or_else(|| {
        McpFlowError::Protocol(format!("tools/list result has no tool list: {}", result))
    })?;

    let mut page = ToolPage {
        next_cursor: result
            .get("nextCursor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
        ..ToolPage::default()
    };

    for entry in entries {
        match serde_json::from_value::<McpTool>(entry.clone()) {
            Ok(tool) if !tool.name.is_empty() => page.tools.push(tool),
            Ok(_) => page.skipped.push("tool entry with empty name".to_string()),
            Err(e) => page.skipped.push(format!("invalid tool entry: {}", e)),
        }
    }
    Ok(page)
}
