pub mod client;
pub mod endpoint;
pub mod session;
pub mod tools;
pub mod transport_sse;
pub mod types;

pub use client::{call_once, list_tools_once, with_session, McpClient};
pub use endpoint::Endpoint;
pub use session::Session;
pub use types::{McpTool, McpToolCall, McpToolResult};
