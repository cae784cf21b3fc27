use serde_json::json;

use super::ErrorPolicy;
use crate::config::defaults::DEFAULT_FETCH_MAX_CHARS;
use crate::config::{Config, ServerSettings, FETCH_SERVER};
use crate::error::{McpFlowError, Result};
use crate::mcp::tools::{first_text, truncate_chars};
use crate::mcp::{call_once, Endpoint, McpToolCall};
use crate::observer::{default_observer, SharedObserver};

pub const FETCH_TOOL: &str = "fetch";

/// Fetches a URL through a remote `fetch` tool and returns its text.
#[derive(Debug, Clone)]
pub struct UrlFetcher {
    endpoint: Endpoint,
    policy: ErrorPolicy,
    max_chars: usize,
    observer: SharedObserver,
}

impl UrlFetcher {
    /// Best-effort by default: failures come back as `"Error: ..."` text.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            policy: ErrorPolicy::Inline,
            max_chars: DEFAULT_FETCH_MAX_CHARS,
            observer: default_observer(),
        }
    }

    pub fn from_settings(settings: &ServerSettings, max_chars: usize) -> Self {
        Self::new(settings.endpoint.clone())
            .with_policy(settings.error_policy)
            .with_max_chars(max_chars)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.server(FETCH_SERVER).ok_or_else(|| {
            McpFlowError::ConfigError(format!("no '{}' server configured", FETCH_SERVER))
        })?;
        Ok(Self::from_settings(settings, config.fetch_max_chars))
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn fetch(&self, url: &str) -> Result<String> {
        let outcome = self.fetch_strict(url).await;
        self.policy.apply(outcome)
    }

    async fn fetch_strict(&self, url: &str) -> Result<String> {
        let call = McpToolCall::new(FETCH_TOOL, json!({ "url": url }));
        let result = call_once(&self.endpoint, self.observer.clone(), call).await?;
        let text = first_text(&result, FETCH_TOOL)?;
        Ok(truncate_chars(&text, self.max_chars).to_string())
    }
}
