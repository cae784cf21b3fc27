use futures::future::BoxFuture;
use serde_json::Value;

use super::endpoint::Endpoint;
use super::session::Session;
use super::types::{McpTool, McpToolCall, McpToolResult};
use crate::error::{McpFlowError, Result};
use crate::observer::{default_observer, SharedObserver};

/// Run `f` against a freshly connected session and close the session
/// afterwards, whether `f` succeeded, failed, or timed out.
pub async fn with_session<T, F>(endpoint: &Endpoint, observer: SharedObserver, f: F) -> Result<T>
where
    F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T>>,
{
    let mut session = Session::connect(endpoint, observer).await?;
    let outcome = f(&mut session).await;
    session.close().await;
    outcome
}

/// Connect, call one tool, disconnect.
pub async fn call_once(
    endpoint: &Endpoint,
    observer: SharedObserver,
    call: McpToolCall,
) -> Result<McpToolResult> {
    with_session(endpoint, observer, move |session| {
        Box::pin(async move { session.call_tool(&call.name, call.arguments).await })
    })
    .await
}

/// Connect, list tools, disconnect.
pub async fn list_tools_once(endpoint: &Endpoint, observer: SharedObserver) -> Result<Vec<McpTool>> {
    with_session(endpoint, observer, |session| Box::pin(session.list_tools())).await
}

/// Client for one endpoint that holds at most one live session. Operations
/// before `connect` or after `close` fail with `NotConnected`.
#[derive(Debug)]
pub struct McpClient {
    endpoint: Endpoint,
    observer: SharedObserver,
    session: Option<Session>,
}

impl McpClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_observer(endpoint, default_observer())
    }

    pub fn with_observer(endpoint: Endpoint, observer: SharedObserver) -> Self {
        Self {
            endpoint,
            observer,
            session: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_active)
    }

    /// Connect if not already connected.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        let session = Session::connect(&self.endpoint, self.observer.clone()).await?;
        self.session = Some(session);
        Ok(())
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(McpFlowError::NotConnected)
    }

    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        self.session_mut()?.list_tools().await
    }

    pub async fn call_tool(&mut self, tool_name: &str, arguments: Value) -> Result<McpToolResult> {
        self.session_mut()?.call_tool(tool_name, arguments).await
    }

    pub async fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}
