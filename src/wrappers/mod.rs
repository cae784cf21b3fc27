//! One wrapper per remote tool family. Each wrapper names its endpoint, tool
//! and arguments; session handling lives in [`crate::mcp::call_once`].

pub mod jira;
pub mod url;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Result;

pub use jira::JiraTools;
pub use url::UrlFetcher;

/// What a wrapper does with a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Return the error to the caller.
    Propagate,
    /// Turn the error into `"Error: <details>"` text.
    Inline,
}

impl ErrorPolicy {
    pub fn apply(self, outcome: Result<String>) -> Result<String> {
        match (self, outcome) {
            (ErrorPolicy::Inline, Err(e)) => Ok(format!("Error: {}", e)),
            (_, outcome) => outcome,
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPolicy::Propagate => f.write_str("propagate"),
            ErrorPolicy::Inline => f.write_str("inline"),
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "propagate" | "raise" | "strict" => Ok(ErrorPolicy::Propagate),
            "inline" | "text" | "best-effort" => Ok(ErrorPolicy::Inline),
            other => Err(format!(
                "unknown error policy '{}' (expected 'propagate' or 'inline')",
                other
            )),
        }
    }
}
