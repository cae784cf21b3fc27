use crate::wrappers::ErrorPolicy;

pub const DEFAULT_FETCH_URL: &str = "http://localhost:3000/sse";
pub const DEFAULT_JIRA_URL: &str = "http://localhost:3001/sse";

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_JIRA_TIMEOUT_SECS: u64 = 3;

/// Fetched pages are cut to this many characters.
pub const DEFAULT_FETCH_MAX_CHARS: usize = 150_000;

pub fn default_log_level() -> String {
    "warn".to_string()
}

pub fn default_timeout_for(server: &str) -> u64 {
    match server {
        super::FETCH_SERVER => DEFAULT_FETCH_TIMEOUT_SECS,
        super::JIRA_SERVER => DEFAULT_JIRA_TIMEOUT_SECS,
        _ => DEFAULT_TIMEOUT_SECS,
    }
}

/// Fetching is best-effort, everything else is strict.
pub fn default_policy_for(server: &str) -> ErrorPolicy {
    match server {
        super::FETCH_SERVER => ErrorPolicy::Inline,
        _ => ErrorPolicy::Propagate,
    }
}
