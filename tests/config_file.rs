use mcpflow::config::{Config, JsonConfig, Overrides, FETCH_SERVER, JIRA_SERVER};
use mcpflow::wrappers::ErrorPolicy;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn test_load_yaml_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mcpflow.yaml");
    fs::write(
        &path,
        r#"
servers:
  jira:
    url: http://jira.internal:8080/sse
    bearer_token: ${JIRA_TOKEN_FROM_VAULT}
    timeout_secs: 7
  search:
    url: http://search.internal/sse
    headers:
      X-Team: platform
fetch:
  max_chars: 2048
logging:
  level: debug
"#,
    )
    .unwrap();

    let file = JsonConfig::load_from(&path).unwrap();
    assert_eq!(file.servers.len(), 2);
    assert_eq!(file.fetch.max_chars, Some(2048));

    let config = Config::resolve(
        file,
        |name| (name == "JIRA_TOKEN_FROM_VAULT").then(|| "vault-token".to_string()),
        &Overrides::default(),
    )
    .unwrap();

    let jira = config.server(JIRA_SERVER).unwrap();
    assert_eq!(jira.endpoint.url(), "http://jira.internal:8080/sse");
    assert_eq!(jira.endpoint.timeout(), Duration::from_secs(7));
    assert!(jira.endpoint.has_credentials());

    // defaults still apply to servers the file leaves out
    assert!(config.server(FETCH_SERVER).is_some());
    assert_eq!(
        config.server("search").unwrap().error_policy,
        ErrorPolicy::Propagate
    );
    assert_eq!(config.fetch_max_chars, 2048);
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_load_json_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mcpflow.json");
    fs::write(
        &path,
        r#"{
  "servers": {
    "fetch": { "url": "http://fetch.internal/sse", "error_policy": "propagate" }
  },
  "logging": { "verbose": true }
}"#,
    )
    .unwrap();

    let config = Config::resolve(
        JsonConfig::load_from(&path).unwrap(),
        no_env,
        &Overrides::default(),
    )
    .unwrap();

    let fetch = config.server(FETCH_SERVER).unwrap();
    assert_eq!(fetch.endpoint.url(), "http://fetch.internal/sse");
    assert_eq!(fetch.error_policy, ErrorPolicy::Propagate);
    assert!(config.verbose);
}

#[test]
fn test_malformed_config_names_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "servers: [not, a, map").unwrap();

    let err = JsonConfig::load_from(&path).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Failed to parse YAML config file"));
    assert!(message.contains("broken.yaml"));
}

#[test]
fn test_missing_config_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = JsonConfig::load_from(&dir.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_write_example_round_trips_and_refuses_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("mcpflow.yaml");

    JsonConfig::write_example(&path).unwrap();
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("${JIRA_API_TOKEN}"));

    let loaded = JsonConfig::load_from(&path).unwrap();
    assert_eq!(loaded.servers.len(), 2);
    assert_eq!(
        loaded.servers[JIRA_SERVER].error_policy,
        Some(ErrorPolicy::Propagate)
    );

    let err = JsonConfig::write_example(&path).unwrap_err();
    assert!(err.to_string().contains("already exists"));
    assert_eq!(fs::read_to_string(&path).unwrap(), written);
}

#[test]
fn test_cli_timeout_beats_file_and_env() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mcpflow.yml");
    fs::write(
        &path,
        "servers:\n  fetch:\n    url: http://localhost:3000/sse\n    timeout_secs: 30\n",
    )
    .unwrap();

    let config = Config::resolve(
        JsonConfig::load_from(&path).unwrap(),
        |name| (name == "MCPFLOW_TIMEOUT").then(|| "20".to_string()),
        &Overrides {
            verbose: false,
            timeout_secs: Some(2),
        },
    )
    .unwrap();
    assert_eq!(
        config.server(FETCH_SERVER).unwrap().endpoint.timeout(),
        Duration::from_secs(2)
    );
}
