#![allow(dead_code)]

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mcpflow::observer::{SessionEvent, SessionObserver};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

#[derive(Debug, Clone, Copy, Default)]
pub struct MockOptions {
    /// Never announce the message endpoint.
    pub silent: bool,
    /// Answer `initialize` with a JSON-RPC error.
    pub reject_initialize: bool,
    /// Never answer `initialize`.
    pub ignore_initialize: bool,
    /// Hold the `notifications/initialized` POST open indefinitely.
    pub stall_initialized: bool,
    /// Fail the stream GET with a 500 whose body never finishes.
    pub failing_stream: bool,
    /// `tools/list` cursors that loop back on themselves.
    pub cursor_loop: bool,
}

#[derive(Default)]
pub struct MockState {
    options: MockOptions,
    sessions: Mutex<HashMap<u64, mpsc::UnboundedSender<Event>>>,
    next_session: AtomicU64,
    auth_headers: Mutex<Vec<Option<String>>>,
    received: Mutex<Vec<Value>>,
}

/// MCP tool server speaking the SSE transport on an ephemeral port.
pub struct MockServer {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Self {
        Self::start_with(MockOptions::default()).await
    }

    pub async fn start_with(options: MockOptions) -> Self {
        let state = Arc::new(MockState {
            options,
            ..MockState::default()
        });
        let app = Router::new()
            .route("/sse", get(sse_handler))
            .route("/messages", post(message_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn sse_url(&self) -> String {
        format!("http://{}/sse", self.addr)
    }

    pub fn sessions_opened(&self) -> u64 {
        self.state.next_session.load(Ordering::SeqCst)
    }

    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.state.auth_headers.lock().unwrap().clone()
    }

    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn received_methods(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|m| m.get("method").and_then(Value::as_str).map(str::to_string))
            .collect()
    }
}

/// A URL nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/sse", addr)
}

fn record_auth(state: &MockState, headers: &HeaderMap) {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.auth_headers.lock().unwrap().push(auth);
}

async fn sse_handler(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    record_auth(&state, &headers);

    if state.options.failing_stream {
        let drip = futures::stream::unfold((), |()| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Some((Ok::<_, Infallible>("x"), ()))
        });
        return (StatusCode::INTERNAL_SERVER_ERROR, Body::from_stream(drip)).into_response();
    }

    let id = state.next_session.fetch_add(1, Ordering::SeqCst);
    let (tx, rx) = mpsc::unbounded_channel();
    if state.options.silent {
        // bytes on the wire, but no endpoint
        let _ = tx.send(Event::default().comment("waiting"));
    } else {
        let _ = tx.send(
            Event::default()
                .event("endpoint")
                .data(format!("/messages?session_id={}", id)),
        );
    }
    state.sessions.lock().unwrap().insert(id, tx);

    Sse::new(UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>)).into_response()
}

async fn message_handler(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(message): Json<Value>,
) -> StatusCode {
    record_auth(&state, &headers);
    state.received.lock().unwrap().push(message.clone());

    let sender = query
        .get("session_id")
        .and_then(|id| id.parse::<u64>().ok())
        .and_then(|id| state.sessions.lock().unwrap().get(&id).cloned());
    let Some(tx) = sender else {
        return StatusCode::NOT_FOUND;
    };

    let method = message.get("method").and_then(Value::as_str);
    if state.options.stall_initialized && method == Some("notifications/initialized") {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
    let id = message.get("id").cloned();
    if let (Some(method), Some(id)) = (method, id) {
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        for reply in respond(&state.options, method, &params, id) {
            let _ = tx.send(Event::default().event("message").data(reply));
        }
    }
    StatusCode::ACCEPTED
}

fn result(id: Value, result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string()
}

fn error(id: Value, code: i64, message: &str) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
        .to_string()
}

fn text(body: impl Into<String>) -> Value {
    json!({ "content": [{ "type": "text", "text": body.into() }] })
}

fn tool(name: &str, properties: Value, required: &[&str]) -> Value {
    json!({
        "name": name,
        "description": format!("Mock {}", name),
        "inputSchema": { "type": "object", "properties": properties, "required": required }
    })
}

fn respond(options: &MockOptions, method: &str, params: &Value, id: Value) -> Vec<String> {
    match method {
        "initialize" if options.reject_initialize => {
            vec![error(id, -32600, "unsupported client")]
        }
        "initialize" if options.ignore_initialize => vec![],
        "initialize" => vec![result(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "serverInfo": { "name": "mock-tools", "version": "1.0.0" },
                "capabilities": { "tools": {} }
            }),
        )],
        "tools/list" if options.cursor_loop => {
            let (tools, next) = match params.get("cursor").and_then(Value::as_str) {
                None => (vec![tool("fetch", json!({}), &[])], "a"),
                Some("a") => (vec![tool("jira_list_projects", json!({}), &[])], "b"),
                _ => (vec![], "a"),
            };
            vec![result(id, json!({ "tools": tools, "nextCursor": next }))]
        }
        "tools/list" => {
            let string = || json!({ "type": "string" });
            let strings = || json!({ "type": "array", "items": { "type": "string" } });
            if params.get("cursor").is_none() {
                vec![result(
                    id,
                    json!({
                        "tools": [
                            tool("fetch", json!({ "url": string() }), &["url"]),
                            tool("jira_list_projects", json!({}), &[]),
                        ],
                        "nextCursor": "page-2"
                    }),
                )]
            } else {
                vec![result(
                    id,
                    json!({
                        "tools": [
                            tool("jira_get_project_details", json!({ "project_id": string() }), &["project_id"]),
                            tool(
                                "jira_search_issues",
                                json!({ "issue_ids": strings(), "project_ids": strings() }),
                                &["issue_ids", "project_ids"],
                            ),
                            tool(
                                "jira_add_issue_comment",
                                json!({ "issue_id": string(), "comment": string() }),
                                &["issue_id", "comment"],
                            ),
                            { "description": "entry without a name" }
                        ]
                    }),
                )]
            }
        }
        "tools/call" => call_tool(params, id),
        _ => vec![error(id, -32601, "method not found")],
    }
}

fn call_tool(params: &Value, id: Value) -> Vec<String> {
    let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
    let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let arg = |key: &str| args.get(key).and_then(Value::as_str).unwrap_or_default().to_string();

    match name {
        "fetch" => {
            let url = arg("url");
            if url.contains("large") {
                vec![result(id, text("a".repeat(200_000)))]
            } else if url.contains("empty") {
                vec![result(id, json!({ "content": [] }))]
            } else {
                vec![result(id, text(format!("Example Domain ({})", url)))]
            }
        }
        "jira_list_projects" => vec![result(id, text(r#"["AE","OPS"]"#))],
        "jira_get_project_details" => {
            let project_id = arg("project_id");
            vec![result(
                id,
                text(json!({ "id": project_id, "name": format!("Project {}", project_id) }).to_string()),
            )]
        }
        "jira_search_issues" => {
            let issues: Vec<Value> = args
                .get("issue_ids")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|key| json!({ "key": key, "summary": "mock issue" }))
                .collect();
            vec![result(id, text(json!({ "issues": issues }).to_string()))]
        }
        "jira_add_issue_comment" => vec![result(
            id,
            text(format!("Comment added to {}: {}", arg("issue_id"), arg("comment"))),
        )],
        "fail" => vec![result(
            id,
            json!({ "content": [{ "type": "text", "text": "boom" }], "isError": true }),
        )],
        "rpc_fail" => vec![error(id, -32602, "unknown tool arguments")],
        // never answers
        "slow" => vec![],
        "ping_first" => vec![
            json!({ "jsonrpc": "2.0", "id": "srv-1", "method": "ping" }).to_string(),
            "not json".to_string(),
            json!({ "jsonrpc": "2.0", "method": "notifications/message", "params": {} }).to_string(),
            result(id, text("pong handled")),
        ],
        other => vec![error(id, -32602, &format!("Unknown tool: {}", other))],
    }
}

/// Records event kinds so tests can count them.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<&'static str>>,
}

impl RecordingObserver {
    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|k| **k == kind)
            .count()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_event(&self, event: &SessionEvent<'_>) {
        let kind = match event {
            SessionEvent::Connecting { .. } => "connecting",
            SessionEvent::Connected { .. } => "connected",
            SessionEvent::ConnectFailed { .. } => "connect_failed",
            SessionEvent::ToolsListed { .. } => "tools_listed",
            SessionEvent::ToolCallStarted { .. } => "call_started",
            SessionEvent::ToolCallFinished { error: None, .. } => "call_finished",
            SessionEvent::ToolCallFinished { error: Some(_), .. } => "call_failed",
            SessionEvent::MessageSkipped { .. } => "skipped",
            SessionEvent::TeardownFailed { .. } => "teardown_failed",
            SessionEvent::Closed { .. } => "closed",
        };
        self.events.lock().unwrap().push(kind);
    }
}
