use futures::future::BoxFuture;
use serde_json::Value;

use super::mcp_tool_base::{McpTool, ToolProvider};
use crate::error::{HarnessError, HarnessResult};
use crate::llm::tools::tool_base::{Tool, ToolDescriptor};

impl<P: ToolProvider + 'static> Tool for McpTool<P> {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn invoke(&self, arguments: Value) -> BoxFuture<'_, HarnessResult<String>> {
        Box::pin(async move {
            let result = self.provider.call_tool(&self.descriptor.name, arguments).await?;
            render_call_result(&self.descriptor.name, &result)
        })
    }
}

/// MCP result is { content: [ { type: "text", text: "..." }, ... ], isError: bool }
pub(crate) fn render_call_result(tool_name: &str, result: &Value) -> HarnessResult<String> {
    let is_error = result
        .get("isError")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let mut parts: Vec<String> = Vec::new();
    if let Some(content) = result.get("content").and_then(|c| c.as_array()) {
        for item in content {
            match item.get("type").and_then(|t| t.as_str()).unwrap_or("text") {
                "text" => {
                    if let Some(text) = item.get("text").and_then(|t| t.as_str()) {
                        parts.push(text.to_string());
                    }
                }
                "image" | "audio" => {
                    let kind = item.get("type").and_then(|t| t.as_str()).unwrap_or("binary");
                    let mime = item.get("mimeType").and_then(|m| m.as_str()).unwrap_or("unknown");
                    parts.push(format!("[{} content: {}]", kind, mime));
                }
                "resource" => {
                    let resource = item.get("resource");
                    if let Some(text) = resource.and_then(|r| r.get("text")).and_then(|t| t.as_str()) {
                        parts.push(text.to_string());
                    } else if let Some(uri) = resource.and_then(|r| r.get("uri")).and_then(|u| u.as_str()) {
                        parts.push(format!("[resource: {}]", uri));
                    }
                }
                other => log::debug!("Skipping MCP content of type {}", other),
            }
        }
    }
    if parts.is_empty() {
        if let Some(structured) = result.get("structuredContent") {
            parts.push(structured.to_string());
        }
    }

    let output = parts.join("\n");
    if is_error {
        return Err(HarnessError::Invocation(format!("{} reported an error: {}", tool_name, output)));
    }
    Ok(output)
}
