pub mod defaults;
mod servers;
mod validation;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Args;
use crate::mcp::Endpoint;
use crate::wrappers::ErrorPolicy;
use defaults::{
    default_log_level, default_policy_for, default_timeout_for, DEFAULT_FETCH_MAX_CHARS,
    DEFAULT_FETCH_URL, DEFAULT_JIRA_URL, DEFAULT_TIMEOUT_SECS,
};

pub use servers::{FetchConfig, LoggingConfig, ServerConfig};
pub use validation::{expand_vars_with, parse_flag};

pub const FETCH_SERVER: &str = "fetch";
pub const JIRA_SERVER: &str = "jira";

/// A resolved server: where it is and what wrappers do when calls fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub endpoint: Endpoint,
    pub error_policy: ErrorPolicy,
}

pub struct Config {
    pub servers: BTreeMap<String, ServerSettings>,
    /// Timeout from `--timeout` or `MCPFLOW_TIMEOUT`, applied to every server.
    pub timeout_override: Option<u64>,
    pub fetch_max_chars: usize,
    pub verbose: bool,
    pub log_level: String,
}

/// Values that only the command line can supply.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub verbose: bool,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JsonConfig {
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_env_and_args(args: &Args) -> Result<Self, String> {
        // Load YAML/JSON configuration first
        let json_config = JsonConfig::load().map_err(|e| format!("{:#}", e))?;

        let overrides = Overrides {
            verbose: args.verbose,
            timeout_secs: args.timeout,
        };

        Self::resolve(json_config, |name| env::var(name).ok(), &overrides)
    }

    /// Merge defaults, file, environment and command line, in rising priority.
    pub fn resolve<F>(json_config: JsonConfig, lookup: F, overrides: &Overrides) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut raw_servers = BTreeMap::new();
        raw_servers.insert(FETCH_SERVER.to_string(), ServerConfig::new(DEFAULT_FETCH_URL));
        raw_servers.insert(JIRA_SERVER.to_string(), ServerConfig::new(DEFAULT_JIRA_URL));
        raw_servers.extend(json_config.servers);

        // Server URLs: env var > config file > default
        if let Some(url) = lookup("MCPFLOW_FETCH_URL") {
            if let Some(server) = raw_servers.get_mut(FETCH_SERVER) {
                server.url = url;
            }
        }
        if let Some(url) = lookup("MCPFLOW_JIRA_URL") {
            if let Some(server) = raw_servers.get_mut(JIRA_SERVER) {
                server.url = url;
            }
        }

        // Jira token: env var > config file
        if let Some(token) = lookup("JIRA_API_TOKEN").filter(|t| !t.is_empty()) {
            if let Some(server) = raw_servers.get_mut(JIRA_SERVER) {
                server.bearer_token = Some(token);
            }
        }

        // Timeout: CLI arg > env var > per-server config > per-server default
        let timeout_override = match overrides.timeout_secs {
            Some(secs) => Some(secs),
            None => match lookup("MCPFLOW_TIMEOUT") {
                Some(raw) => Some(
                    raw.parse::<u64>()
                        .map_err(|_| format!("MCPFLOW_TIMEOUT must be a number of seconds, got '{}'", raw))?,
                ),
                None => None,
            },
        };

        let mut servers = BTreeMap::new();
        for (name, raw) in raw_servers {
            let timeout_secs = timeout_override
                .or(raw.timeout_secs)
                .unwrap_or_else(|| default_timeout_for(&name));
            if timeout_secs == 0 {
                return Err(format!("Server '{}' timeout must be at least one second", name));
            }

            let url = expand_vars_with(&raw.url, &lookup);
            let headers = raw
                .headers
                .iter()
                .map(|(key, value)| (key.clone(), expand_vars_with(value, &lookup)));
            let token = raw
                .bearer_token
                .as_deref()
                .map(|token| expand_vars_with(token, &lookup));

            let endpoint = Endpoint::new(url)
                .with_headers(headers)
                .with_bearer_token(token)
                .with_timeout(Duration::from_secs(timeout_secs));
            // fail early on headers reqwest would reject
            endpoint.header_map().map_err(|e| format!("Server '{}': {}", name, e))?;

            let error_policy = raw.error_policy.unwrap_or_else(|| default_policy_for(&name));
            servers.insert(
                name,
                ServerSettings {
                    endpoint,
                    error_policy,
                },
            );
        }

        // Fetch cap: env var > config file > default
        let fetch_max_chars = match lookup("MCPFLOW_FETCH_MAX_CHARS") {
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                format!("MCPFLOW_FETCH_MAX_CHARS must be a number of characters, got '{}'", raw)
            })?,
            None => json_config.fetch.max_chars.unwrap_or(DEFAULT_FETCH_MAX_CHARS),
        };

        // Get verbose flag: CLI arg > env var > config file > default
        let verbose = overrides.verbose
            || lookup("MCPFLOW_VERBOSE")
                .map(|v| parse_flag(&v))
                .or(json_config.logging.verbose)
                .unwrap_or(false);

        let log_level = lookup("MCPFLOW_LOG")
            .or(json_config.logging.level)
            .unwrap_or_else(default_log_level);

        Ok(Config {
            servers,
            timeout_override,
            fetch_max_chars,
            verbose,
            log_level,
        })
    }

    pub fn server(&self, name: &str) -> Option<&ServerSettings> {
        self.servers.get(name)
    }

    /// A configured server by name, or an ad hoc one when given a URL.
    pub fn resolve_server(&self, name_or_url: &str) -> Result<ServerSettings, String> {
        if let Some(settings) = self.server(name_or_url) {
            return Ok(settings.clone());
        }
        if name_or_url.starts_with("http://") || name_or_url.starts_with("https://") {
            return Ok(ServerSettings {
                endpoint: Endpoint::new(name_or_url).with_timeout(Duration::from_secs(
                    self.timeout_override.unwrap_or(DEFAULT_TIMEOUT_SECS),
                )),
                error_policy: ErrorPolicy::Propagate,
            });
        }
        let known: Vec<&str> = self.servers.keys().map(String::as_str).collect();
        Err(format!(
            "Unknown server '{}' (configured: {})",
            name_or_url,
            known.join(", ")
        ))
    }
}

impl JsonConfig {
    pub fn load() -> Result<Self> {
        for path in Self::get_config_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        // No config file found, return default
        Ok(JsonConfig::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|s| s.to_str());
        let config: JsonConfig = if extension == Some("yaml") || extension == Some("yml") {
            serde_yaml::from_str(&contents).with_context(|| {
                format!("Failed to parse YAML config file: {}", path.display())
            })?
        } else {
            serde_json::from_str(&contents).with_context(|| {
                format!("Failed to parse JSON config file: {}", path.display())
            })?
        };

        Ok(config)
    }

    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Current directory (highest priority - local override)
        paths.push(PathBuf::from(".mcpflow.yaml"));
        paths.push(PathBuf::from(".mcpflow.yml"));
        paths.push(PathBuf::from(".mcpflow.json"));

        // 2. User's config directory (global config)
        if let Some(home_dir) = dirs::home_dir() {
            let config_dir = home_dir.join(".config").join("mcpflow");
            paths.push(config_dir.join("mcpflow.yaml"));
            paths.push(config_dir.join("mcpflow.yml"));
            paths.push(config_dir.join("mcpflow.json"));
        }

        paths
    }

    /// The file written by `--config-init`.
    pub fn example() -> Self {
        let mut fetch = ServerConfig::new(DEFAULT_FETCH_URL);
        fetch.timeout_secs = Some(default_timeout_for(FETCH_SERVER));
        fetch.error_policy = Some(ErrorPolicy::Inline);

        let mut jira = ServerConfig::new(DEFAULT_JIRA_URL);
        jira.timeout_secs = Some(default_timeout_for(JIRA_SERVER));
        jira.bearer_token = Some("${JIRA_API_TOKEN}".to_string());
        jira.error_policy = Some(ErrorPolicy::Propagate);

        let mut servers = BTreeMap::new();
        servers.insert(FETCH_SERVER.to_string(), fetch);
        servers.insert(JIRA_SERVER.to_string(), jira);

        JsonConfig {
            servers,
            fetch: FetchConfig {
                max_chars: Some(DEFAULT_FETCH_MAX_CHARS),
            },
            logging: LoggingConfig {
                level: Some(default_log_level()),
                verbose: Some(false),
            },
        }
    }

    /// Write the example config to `path`, refusing to overwrite.
    pub fn write_example(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(&Self::example())?;
        fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn default_user_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("mcpflow").join("mcpflow.yaml"))
    }
}
