use std::sync::Arc;

use super::mcp_tool_base::{McpTool, ToolProvider};
use crate::error::HarnessResult;
use crate::llm::tools::tool_base::Tool;
use crate::llm::utils::string_util::single_line;

/// Discover the provider's tools and wrap each one as a callable function.
pub async fn load_mcp_tools<P: ToolProvider + 'static>(provider: &Arc<P>) -> HarnessResult<Vec<Arc<dyn Tool>>> {
    let descriptors = provider.list_tools().await?;
    log::info!("MCP server reported {} tools", descriptors.len());

    let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        log::info!("{}: {}", descriptor.name, single_line(&descriptor.description));
        tools.push(Arc::new(McpTool::new(Arc::clone(provider), descriptor)));
    }
    Ok(tools)
}
