//! Connection lifecycle observation.
//!
//! Sessions report what they do through a [`SessionObserver`] handed to them
//! at construction. The library never installs a global logger itself.

use colored::*;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::McpFlowError;
use crate::mcp::types::ServerInfo;

#[derive(Debug)]
pub enum SessionEvent<'a> {
    Connecting {
        session: Uuid,
        endpoint: &'a str,
    },
    Connected {
        session: Uuid,
        endpoint: &'a str,
        server: Option<&'a ServerInfo>,
        elapsed: Duration,
    },
    ConnectFailed {
        session: Uuid,
        endpoint: &'a str,
        error: &'a McpFlowError,
    },
    ToolsListed {
        session: Uuid,
        count: usize,
    },
    ToolCallStarted {
        session: Uuid,
        tool: &'a str,
    },
    ToolCallFinished {
        session: Uuid,
        tool: &'a str,
        elapsed: Duration,
        error: Option<&'a McpFlowError>,
    },
    /// A message on the stream was not for us or could not be decoded.
    MessageSkipped {
        session: Uuid,
        reason: &'a str,
    },
    TeardownFailed {
        session: Uuid,
        error: &'a str,
    },
    Closed {
        session: Uuid,
        endpoint: &'a str,
    },
}

pub trait SessionObserver: Send + Sync + fmt::Debug {
    fn on_event(&self, event: &SessionEvent<'_>);
}

pub type SharedObserver = Arc<dyn SessionObserver>;

/// Forwards lifecycle events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, event: &SessionEvent<'_>) {
        match event {
            SessionEvent::Connecting { session, endpoint } => {
                tracing::debug!(%session, endpoint, "connecting to MCP server");
            }
            SessionEvent::Connected {
                session,
                endpoint,
                server,
                elapsed,
            } => {
                tracing::info!(
                    %session,
                    endpoint,
                    server = server.map(|s| s.name.as_str()).unwrap_or("unknown"),
                    version = server.map(|s| s.version.as_str()).unwrap_or("?"),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "connected to MCP server"
                );
            }
            SessionEvent::ConnectFailed {
                session,
                endpoint,
                error,
            } => {
                tracing::warn!(%session, endpoint, %error, "MCP connection failed");
            }
            SessionEvent::ToolsListed { session, count } => {
                tracing::debug!(%session, count, "listed tools");
            }
            SessionEvent::ToolCallStarted { session, tool } => {
                tracing::debug!(%session, tool, "calling tool");
            }
            SessionEvent::ToolCallFinished {
                session,
                tool,
                elapsed,
                error,
            } => match error {
                None => tracing::info!(
                    %session,
                    tool,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "tool call finished"
                ),
                Some(error) => tracing::warn!(
                    %session,
                    tool,
                    elapsed_ms = elapsed.as_millis() as u64,
                    %error,
                    "tool call failed"
                ),
            },
            SessionEvent::MessageSkipped { session, reason } => {
                tracing::debug!(%session, reason, "skipped server message");
            }
            SessionEvent::TeardownFailed { session, error } => {
                tracing::error!(%session, error, "error while closing MCP session");
            }
            SessionEvent::Closed { session, endpoint } => {
                tracing::debug!(%session, endpoint, "MCP session closed");
            }
        }
    }
}

/// Dimmed stderr lines for the CLI's verbose mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver;

impl ConsoleObserver {
    fn line(&self, session: &Uuid, message: String) {
        let short = session.simple().to_string();
        eprintln!(
            "{}",
            format!(
                "[mcp {} {}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                &short[..8],
                message
            )
            .dimmed()
        );
    }
}

impl SessionObserver for ConsoleObserver {
    fn on_event(&self, event: &SessionEvent<'_>) {
        match event {
            SessionEvent::Connecting { session, endpoint } => {
                self.line(session, format!("Connecting to {}", endpoint));
            }
            SessionEvent::Connected {
                session,
                server,
                elapsed,
                ..
            } => {
                let server = server
                    .map(|s| format!("{} v{}", s.name, s.version))
                    .unwrap_or_else(|| "unknown server".to_string());
                self.line(
                    session,
                    format!("Connected to {} in {}ms", server, elapsed.as_millis()),
                );
            }
            SessionEvent::ConnectFailed { session, error, .. } => {
                self.line(session, format!("Connection failed: {}", error));
            }
            SessionEvent::ToolsListed { session, count } => {
                self.line(session, format!("Server offers {} tool(s)", count));
            }
            SessionEvent::ToolCallStarted { session, tool } => {
                self.line(session, format!("Calling {}", tool));
            }
            SessionEvent::ToolCallFinished {
                session,
                tool,
                elapsed,
                error,
            } => {
                let outcome = match error {
                    None => "ok".to_string(),
                    Some(e) => format!("failed: {}", e),
                };
                self.line(
                    session,
                    format!("{} {} ({}ms)", tool, outcome, elapsed.as_millis()),
                );
            }
            SessionEvent::MessageSkipped { session, reason } => {
                self.line(session, format!("Skipped message: {}", reason));
            }
            SessionEvent::TeardownFailed { session, error } => {
                self.line(session, format!("Warning: teardown failed: {}", error));
            }
            SessionEvent::Closed { session, .. } => {
                self.line(session, "Closed".to_string());
            }
        }
    }
}

pub fn default_observer() -> SharedObserver {
    Arc::new(TracingObserver)
}
