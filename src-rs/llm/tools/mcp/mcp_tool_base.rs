use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::error::HarnessResult;
use crate::llm::tools::tool_base::ToolDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A remote source of tools: discovery plus invocation.
pub trait ToolProvider: Send + Sync {
    fn list_tools(&self) -> impl Future<Output = HarnessResult<Vec<ToolDescriptor>>> + Send;

    /// Forward `arguments` to the remote tool `name` and return its raw result.
    fn call_tool(&self, name: &str, arguments: Value) -> impl Future<Output = HarnessResult<Value>> + Send;
}

/// One remote tool exposed as a callable function
pub struct McpTool<P: ToolProvider> {
    pub(crate) provider: Arc<P>,
    pub(crate) descriptor: ToolDescriptor,
}

impl<P: ToolProvider> McpTool<P> {
    pub fn new(provider: Arc<P>, descriptor: ToolDescriptor) -> Self {
        log::debug!("MCP Tool Loaded: {}", descriptor.name);
        Self { provider, descriptor }
    }
}
