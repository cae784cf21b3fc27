use jsonschema::JSONSchema;
use serde_json::Value;

use super::types::{McpTool, McpToolResult};
use crate::error::{McpFlowError, Result};

/// First `max_chars` characters of `text`. Shorter text is returned as is.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_pos, _)) => &text[..byte_pos],
        None => text,
    }
}

/// The text of the first content item, which is all the wrappers consume.
pub fn first_text(result: &McpToolResult, tool_name: &str) -> Result<String> {
    result.first_text().map(str::to_string).ok_or_else(|| {
        McpFlowError::Protocol(format!("tool '{}' returned no text content", tool_name))
    })
}

/// Check arguments against the tool's declared input schema.
pub fn validate_arguments(tool: &McpTool, arguments: &Value) -> std::result::Result<(), String> {
    let schema = match JSONSchema::compile(&tool.input_schema) {
        Ok(s) => s,
        Err(e) => return Err(format!("Invalid tool schema: {}", e)),
    };

    if let Err(errors) = schema.validate(arguments) {
        let error_messages: Vec<String> = errors
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();
        return Err(error_messages.join("; "));
    }

    Ok(())
}
