pub mod mcp_tool_client;
pub mod mcp_tool_base;
pub mod mcp_tool_adapter;
pub mod mcp_tool_registry;
pub mod transport;

pub use mcp_tool_base::{McpTool, ToolProvider};
pub use mcp_tool_client::McpClient;
pub use mcp_tool_registry::load_mcp_tools;
