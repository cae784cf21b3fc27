use colored::*;

use crate::mcp::McpTool;

const RULE: &str = "──────────────────────────────────────────────────────────";

/// Display a tool result in a boxed format
pub fn display_tool_result(name: &str, result: &str) {
    println!("{}", format!("┌─[TOOL: {}]", name).cyan());
    // Avoid double newline if result already ends with one
    print!("{}", result);
    if !result.ends_with('\n') {
        println!();
    }
    println!("{}", format!("└{}", RULE).dimmed());
}

/// Display a tool error in a boxed format
pub fn display_tool_error(name: &str, error: &str) {
    eprintln!("{}", format!("┌─[TOOL ERROR: {}]", name).red());
    eprintln!("{}", error.trim_end());
    eprintln!("{}", format!("└{}", RULE).dimmed());
}

/// Plain text output for wrapper results, so they can be piped.
pub fn display_content(content: &str) {
    print!("{}", content);
    if !content.ends_with('\n') {
        println!();
    }
}

pub fn display_tools(server: &str, tools: &[McpTool]) {
    println!(
        "{}",
        format!("{} tool(s) available on {}", tools.len(), server).cyan()
    );
    for tool in tools {
        println!("  {}", tool.name.bold());
        if let Some(description) = tool.description.as_deref().filter(|d| !d.is_empty()) {
            for line in description.lines() {
                println!("    {}", line.dimmed());
            }
        }
        if let Some(params) = describe_parameters(tool) {
            println!("    {}", format!("params: {}", params).dimmed());
        }
    }
}

/// `name*: type` for each property in the input schema; `*` marks required.
pub fn describe_parameters(tool: &McpTool) -> Option<String> {
    let properties = tool.input_schema.get("properties")?.as_object()?;
    if properties.is_empty() {
        return None;
    }
    let required: Vec<&str> = tool
        .input_schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let params: Vec<String> = properties
        .iter()
        .map(|(name, schema)| {
            let kind = schema.get("type").and_then(|t| t.as_str()).unwrap_or("any");
            let marker = if required.contains(&name.as_str()) { "*" } else { "" };
            format!("{}{}: {}", name, marker, kind)
        })
        .collect();
    Some(params.join(", "))
}
