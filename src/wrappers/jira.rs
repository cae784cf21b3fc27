use serde_json::{json, Value};

use super::ErrorPolicy;
use crate::config::{Config, ServerSettings, JIRA_SERVER};
use crate::error::{McpFlowError, Result};
use crate::mcp::tools::first_text;
use crate::mcp::{call_once, Endpoint, McpToolCall};
use crate::observer::{default_observer, SharedObserver};

pub const GET_PROJECT_DETAILS_TOOL: &str = "jira_get_project_details";
pub const LIST_PROJECTS_TOOL: &str = "jira_list_projects";
pub const SEARCH_ISSUES_TOOL: &str = "jira_search_issues";
pub const ADD_ISSUE_COMMENT_TOOL: &str = "jira_add_issue_comment";

/// Jira operations exposed by a remote Jira tool server. Results are the raw
/// text the tool returns, usually JSON.
#[derive(Debug, Clone)]
pub struct JiraTools {
    endpoint: Endpoint,
    policy: ErrorPolicy,
    observer: SharedObserver,
}

impl JiraTools {
    /// Strict by default: failures are returned as errors.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            policy: ErrorPolicy::Propagate,
            observer: default_observer(),
        }
    }

    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self::new(settings.endpoint.clone()).with_policy(settings.error_policy)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.server(JIRA_SERVER).ok_or_else(|| {
            McpFlowError::ConfigError(format!("no '{}' server configured", JIRA_SERVER))
        })?;
        Ok(Self::from_settings(settings))
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub async fn get_project_details(&self, project_id: &str) -> Result<String> {
        self.run(
            GET_PROJECT_DETAILS_TOOL,
            json!({ "project_id": project_id }),
        )
        .await
    }

    pub async fn list_projects(&self) -> Result<String> {
        self.run(LIST_PROJECTS_TOOL, json!({})).await
    }

    pub async fn search_issues(&self, issue_ids: &[String], project_ids: &[String]) -> Result<String> {
        self.run(
            SEARCH_ISSUES_TOOL,
            json!({
                "issue_ids": issue_ids,
                "project_ids": project_ids,
            }),
        )
        .await
    }

    pub async fn add_issue_comment(&self, issue_id: &str, comment: &str) -> Result<String> {
        self.run(
            ADD_ISSUE_COMMENT_TOOL,
            json!({
                "issue_id": issue_id,
                "comment": comment,
            }),
        )
        .await
    }

    async fn run(&self, tool: &str, arguments: Value) -> Result<String> {
        let outcome = async {
            let result = call_once(
                &self.endpoint,
                self.observer.clone(),
                McpToolCall::new(tool, arguments),
            )
            .await?;
            first_text(&result, tool)
        }
        .await;
        self.policy.apply(outcome)
    }
}
