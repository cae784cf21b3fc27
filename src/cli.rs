use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

#[derive(Parser, Debug)]
#[command(name = "mcpflow")]
#[command(about = "Call remote MCP tool servers over SSE", long_about = None)]
pub struct Args {
    #[arg(
        short = 'v',
        long = "verbose",
        global = true,
        help = "Print connection lifecycle events"
    )]
    pub verbose: bool,

    #[arg(
        long = "timeout",
        global = true,
        help = "Override the handshake and response timeout (seconds)"
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "config-init",
        help = "Write an example config file to ~/.config/mcpflow/mcpflow.yaml"
    )]
    pub config_init: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a URL through the fetch tool server
    Fetch {
        url: String,

        #[arg(long = "max-chars", help = "Cut the result to this many characters")]
        max_chars: Option<usize>,

        #[arg(long = "strict", help = "Fail with an error instead of printing 'Error: ...'")]
        strict: bool,
    },

    /// Query the Jira tool server
    Jira {
        #[command(subcommand)]
        action: JiraCommand,
    },

    /// List the tools a server offers
    Tools {
        #[arg(long = "server", default_value = "fetch", help = "Server name or SSE URL")]
        server: String,
    },

    /// Call any tool with arguments
    Call {
        tool: String,

        #[arg(long = "server", default_value = "fetch", help = "Server name or SSE URL")]
        server: String,

        #[arg(
            short = 'a',
            long = "arg",
            help = "Tool argument as key=value; values that parse as JSON are sent as JSON"
        )]
        args: Vec<String>,

        #[arg(long = "json", help = "Tool arguments as a JSON object")]
        json: Option<String>,

        #[arg(long = "validate", help = "Check arguments against the tool's input schema first")]
        validate: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum JiraCommand {
    /// List all projects
    Projects,

    /// Show one project
    Project { project_id: String },

    /// Search issues by id and/or project
    Search {
        #[arg(long = "issue", help = "Issue id, repeatable (e.g. AE-1008)")]
        issue_ids: Vec<String>,

        #[arg(long = "project", help = "Project id, repeatable")]
        project_ids: Vec<String>,
    },

    /// Comment on an issue
    Comment {
        issue_id: String,

        #[arg(required = true, num_args = 1.., help = "Comment text")]
        comment: Vec<String>,
    },
}

/// Build a tool argument object from `--json` and `--arg key=value` pairs.
/// Pairs are applied after the JSON object and win on conflicts.
pub fn parse_tool_arguments(pairs: &[String], json: Option<&str>) -> Result<Value, String> {
    let mut arguments = match json {
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err("--json must be a JSON object".to_string()),
            Err(e) => return Err(format!("Invalid --json: {}", e)),
        },
        None => Map::new(),
    };

    for pair in pairs {
        let (key, raw_value) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid argument '{}': expected key=value", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid argument '{}': empty key", pair));
        }
        // Only structured JSON is taken literally; bare words stay strings.
        let value = match serde_json::from_str::<Value>(raw_value) {
            Ok(parsed @ (Value::Array(_) | Value::Object(_) | Value::Number(_) | Value::Bool(_))) => {
                parsed
            }
            _ => Value::String(raw_value.to_string()),
        };
        arguments.insert(key.to_string(), value);
    }

    Ok(Value::Object(arguments))
}
