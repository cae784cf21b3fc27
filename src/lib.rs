//! Thin client for remote MCP tool servers reached over SSE.
//!
//! Every call opens its own [`mcp::Session`], invokes one tool and closes the
//! session again. [`wrappers`] packages the common calls (URL fetch, Jira)
//! and [`config`] resolves where the servers live.

pub mod cli;
pub mod config;
pub mod error;
pub mod mcp;
pub mod observer;
pub mod ui;
pub mod wrappers;

pub use error::{McpFlowError, Result};
