use clap::Parser;
use colored::*;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use mcpflow::cli::{parse_tool_arguments, Args, Command, JiraCommand};
use mcpflow::config::{Config, JsonConfig};
use mcpflow::error::{McpFlowError, Result};
use mcpflow::mcp::tools::validate_arguments;
use mcpflow::mcp::{with_session, McpClient};
use mcpflow::observer::{default_observer, ConsoleObserver, SharedObserver};
use mcpflow::ui::{display_content, display_tool_error, display_tool_result, display_tools};
use mcpflow::wrappers::{ErrorPolicy, JiraTools, UrlFetcher};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Handle --config-init option
    if args.config_init {
        match JsonConfig::default_user_path() {
            Some(path) => match JsonConfig::write_example(&path) {
                Ok(()) => {
                    println!("{}", format!("Wrote example config to {}", path.display()).green());
                    return;
                }
                Err(e) => {
                    eprintln!("{} {:#}", "Error:".red(), e);
                    process::exit(1);
                }
            },
            None => {
                eprintln!("{} could not determine home directory", "Error:".red());
                process::exit(1);
            }
        }
    }

    // Load configuration
    let config = match Config::from_env_and_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            process::exit(1);
        }
    };

    init_logging(&config.log_level);

    let Some(command) = args.command else {
        print_usage();
        process::exit(1);
    };

    let observer: SharedObserver = if config.verbose {
        Arc::new(ConsoleObserver)
    } else {
        default_observer()
    };

    if let Err(e) = run(command, &config, observer).await {
        eprintln!("{} {}", "Error:".red(), e);
        process::exit(1);
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_usage() {
    eprintln!("{}", "Usage: mcpflow [OPTIONS] <COMMAND>".red());
    eprintln!("{}", "  fetch <url>                  Fetch a URL via the fetch server".dimmed());
    eprintln!("{}", "  jira projects                List Jira projects".dimmed());
    eprintln!("{}", "  jira project <id>            Show a Jira project".dimmed());
    eprintln!("{}", "  jira search --issue <id>     Search Jira issues".dimmed());
    eprintln!("{}", "  jira comment <issue> <text>  Comment on a Jira issue".dimmed());
    eprintln!("{}", "  tools [--server <name|url>]  List tools on a server".dimmed());
    eprintln!("{}", "  call <tool> [--arg k=v]...   Call any tool".dimmed());
    eprintln!("{}", "      --config-init            Write an example config file".dimmed());
}

async fn run(command: Command, config: &Config, observer: SharedObserver) -> Result<()> {
    match command {
        Command::Fetch {
            url,
            max_chars,
            strict,
        } => {
            let mut fetcher = UrlFetcher::from_config(config)?.with_observer(observer);
            if let Some(max_chars) = max_chars {
                fetcher = fetcher.with_max_chars(max_chars);
            }
            if strict {
                fetcher = fetcher.with_policy(ErrorPolicy::Propagate);
            }
            let text = fetcher.fetch(&url).await?;
            display_content(&text);
        }
        Command::Jira { action } => {
            let jira = JiraTools::from_config(config)?.with_observer(observer);
            let text = match action {
                JiraCommand::Projects => jira.list_projects().await?,
                JiraCommand::Project { project_id } => jira.get_project_details(&project_id).await?,
                JiraCommand::Search {
                    issue_ids,
                    project_ids,
                } => jira.search_issues(&issue_ids, &project_ids).await?,
                JiraCommand::Comment { issue_id, comment } => {
                    jira.add_issue_comment(&issue_id, &comment.join(" ")).await?
                }
            };
            display_content(&text);
        }
        Command::Tools { server } => {
            let settings = config.resolve_server(&server).map_err(McpFlowError::ConfigError)?;
            let mut client = McpClient::with_observer(settings.endpoint, observer);
            client.connect().await?;
            let tools = client.list_tools().await;
            client.shutdown().await;
            display_tools(&server, &tools?);
        }
        Command::Call {
            tool,
            server,
            args,
            json,
            validate,
        } => {
            let arguments =
                parse_tool_arguments(&args, json.as_deref()).map_err(McpFlowError::Other)?;
            let settings = config.resolve_server(&server).map_err(McpFlowError::ConfigError)?;
            let tool_name = tool.clone();

            let outcome = with_session(&settings.endpoint, observer, move |session| {
                Box::pin(async move {
                    if validate {
                        let tools = session.list_tools().await?;
                        let descriptor = tools.iter().find(|t| t.name == tool).ok_or_else(|| {
                            McpFlowError::Other(format!("Tool '{}' not found on server", tool))
                        })?;
                        validate_arguments(descriptor, &arguments).map_err(|e| {
                            McpFlowError::Other(format!(
                                "Tool '{}' argument validation failed: {}",
                                tool, e
                            ))
                        })?;
                    }
                    session.call_tool(&tool, arguments).await
                })
            })
            .await;

            match outcome {
                Ok(result) => display_tool_result(&tool_name, &result.joined_text()),
                Err(McpFlowError::RemoteTool { message, .. }) => {
                    display_tool_error(&tool_name, &message);
                    process::exit(1);
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}
