// Callable functions and the MCP-backed tool source

pub mod mcp;
pub mod tool_base;
pub mod tool_registry;

// Re-export main types
pub use tool_base::{Tool, ToolDescriptor};
pub use tool_registry::{RegisteredTool, ToolRegistry};
