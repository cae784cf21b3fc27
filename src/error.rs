use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum McpFlowError {
    /// The transport to the endpoint could not be established.
    Connection(String),
    /// The initialize handshake failed or did not finish in time.
    Handshake(String),
    /// No response to a request arrived within the configured window.
    Timeout {
        method: String,
        after: Duration,
    },
    /// An operation was attempted without a live session.
    NotConnected,
    /// The remote tool reported a failure.
    RemoteTool {
        tool: String,
        message: String,
    },
    /// The server sent something that is not valid MCP.
    Protocol(String),
    ConfigError(String),
    NetworkError(reqwest::Error),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
    YamlError(serde_yaml::Error),
    Other(String),
}

impl fmt::Display for McpFlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McpFlowError::Connection(msg) => write!(f, "Connection error: {}", msg),
            McpFlowError::Handshake(msg) => write!(f, "Handshake error: {}", msg),
            McpFlowError::Timeout { method, after } => write!(
                f,
                "Timeout: no response to '{}' within {:.1}s",
                method,
                after.as_secs_f64()
            ),
            McpFlowError::NotConnected => write!(f, "Not connected to MCP server"),
            McpFlowError::RemoteTool { tool, message } => {
                write!(f, "Tool '{}' failed: {}", tool, message)
            }
            McpFlowError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            McpFlowError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            McpFlowError::NetworkError(e) => write!(f, "Network error: {}", e),
            McpFlowError::IoError(e) => write!(f, "IO error: {}", e),
            McpFlowError::JsonError(e) => write!(f, "JSON error: {}", e),
            McpFlowError::YamlError(e) => write!(f, "YAML error: {}", e),
            McpFlowError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for McpFlowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            McpFlowError::NetworkError(e) => Some(e),
            McpFlowError::IoError(e) => Some(e),
            McpFlowError::JsonError(e) => Some(e),
            McpFlowError::YamlError(e) => Some(e),
            _ => None,
        }
    }
}

impl McpFlowError {
    /// Whether the error happened before a session was established.
    pub fn is_connection(&self) -> bool {
        matches!(self, McpFlowError::Connection(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, McpFlowError::Timeout { .. })
    }
}

impl From<reqwest::Error> for McpFlowError {
    fn from(err: reqwest::Error) -> Self {
        McpFlowError::NetworkError(err)
    }
}

impl From<std::io::Error> for McpFlowError {
    fn from(err: std::io::Error) -> Self {
        McpFlowError::IoError(err)
    }
}

impl From<serde_json::Error> for McpFlowError {
    fn from(err: serde_json::Error) -> Self {
        McpFlowError::JsonError(err)
    }
}

impl From<serde_yaml::Error> for McpFlowError {
    fn from(err: serde_yaml::Error) -> Self {
        McpFlowError::YamlError(err)
    }
}

impl From<anyhow::Error> for McpFlowError {
    fn from(err: anyhow::Error) -> Self {
        McpFlowError::ConfigError(format!("{:#}", err))
    }
}

impl From<String> for McpFlowError {
    fn from(msg: String) -> Self {
        McpFlowError::Other(msg)
    }
}

impl From<&str> for McpFlowError {
    fn from(msg: &str) -> Self {
        McpFlowError::Other(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, McpFlowError>;
