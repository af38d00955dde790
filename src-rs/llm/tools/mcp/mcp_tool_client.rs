use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::mcp_tool_base::{JsonRpcRequest, JsonRpcResponse, ToolProvider};
use super::transport::{McpTransport, StdioTransport, StreamableHttpTransport};
use crate::error::{HarnessError, HarnessResult};
use crate::llm::tools::tool_base::ToolDescriptor;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

struct ClientInner {
    transport: Box<dyn McpTransport>,
    request_id: u64,
    started: bool,
    initialized: bool,
}

/// JSON-RPC client for one MCP server.
///
/// Building the client does no I/O. The transport is started and the
/// handshake performed on first use.
pub struct McpClient {
    inner: Mutex<ClientInner>,
}

impl McpClient {
    pub fn new_stdio(
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
        inherit_stderr: bool,
    ) -> Self {
        Self::with_transport(Box::new(StdioTransport::new(command, args, env, inherit_stderr)))
    }

    pub fn new_streamable_http(mcp_url: String, headers: HashMap<String, String>) -> Self {
        Self::with_transport(Box::new(StreamableHttpTransport::new(mcp_url, headers)))
    }

    pub fn with_transport(transport: Box<dyn McpTransport>) -> Self {
        Self {
            inner: Mutex::new(ClientInner {
                transport,
                request_id: 0,
                started: false,
                initialized: false,
            }),
        }
    }

    /// Start the transport and run the `initialize` handshake. Later calls are no-ops.
    pub async fn initialize(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.initialized {
            return Ok(());
        }

        if !inner.started {
            inner.transport.start().await?;
            inner.started = true;
        }

        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        let result = Self::request_locked(&mut inner, "initialize", Some(params)).await?;

        let server = result.get("serverInfo");
        log::info!(
            "MCP server initialized: name={}, version={}, protocol={}",
            server.and_then(|s| s.get("name")).and_then(|v| v.as_str()).unwrap_or("unknown"),
            server.and_then(|s| s.get("version")).and_then(|v| v.as_str()).unwrap_or("unknown"),
            result.get("protocolVersion").and_then(|v| v.as_str()).unwrap_or("unknown"),
        );

        Self::notify_locked(&mut inner, "notifications/initialized", None).await?;
        inner.initialized = true;
        Ok(())
    }

    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let mut inner = self.inner.lock().await;
        Self::request_locked(&mut inner, method, params).await
    }

    async fn request_locked(inner: &mut ClientInner, method: &str, params: Option<Value>) -> Result<Value> {
        inner.request_id += 1;
        let id = inner.request_id;

        let req = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(id)),
            method: method.to_string(),
            params,
        };
        inner.transport.send(serde_json::to_string(&req)?).await?;

        loop {
            let line = inner.transport.next_message().await?;
            if line.trim().is_empty() {
                continue;
            }

            let Ok(message) = serde_json::from_str::<Value>(&line) else {
                log::debug!("MCP Raw Output: {}", line);
                continue;
            };

            // Server-to-client traffic: requests need an answer, notifications don't.
            if let Some(server_method) = message.get("method").and_then(|m| m.as_str()) {
                match message.get("id") {
                    Some(server_id) if !server_id.is_null() => {
                        let reply = reply_to_server_request(server_method, server_id.clone());
                        inner.transport.send(reply.to_string()).await?;
                    }
                    _ => log::debug!("MCP notification: {}", line),
                }
                continue;
            }

            let resp: JsonRpcResponse = match serde_json::from_value(message) {
                Ok(r) => r,
                Err(_) => {
                    log::debug!("Ignored MCP message: {}", line);
                    continue;
                }
            };
            if resp.id.as_ref().and_then(|v| v.as_u64()) != Some(id) {
                log::debug!("Ignored MCP message: {}", line);
                continue;
            }
            if let Some(err) = resp.error {
                bail!("MCP Error {}: {}", err.code, err.message);
            }
            return Ok(resp.result.unwrap_or(Value::Null));
        }
    }

    async fn notify_locked(inner: &mut ClientInner, method: &str, params: Option<Value>) -> Result<()> {
        let req = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.to_string(),
            params,
        };
        inner.transport.send(serde_json::to_string(&req)?).await
    }

    /// Raw `tools/list` entries across all pages.
    pub async fn list_tool_definitions(&self) -> Result<Vec<Value>> {
        self.initialize().await?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let response = self.request("tools/list", params).await?;

            let page = response
                .get("tools")
                .and_then(|t| t.as_array())
                .ok_or_else(|| anyhow!("tools/list response has no 'tools' array"))?;
            tools.extend(page.iter().cloned());

            match response.get("nextCursor").and_then(|c| c.as_str()) {
                Some(next) if !next.is_empty() => cursor = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(tools)
    }

    /// Stop the transport (kills a stdio server, ends an HTTP session).
    ///
    /// A transport that was started is closed even if the handshake never finished.
    pub async fn shutdown(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.started {
            return Ok(());
        }
        inner.started = false;
        inner.initialized = false;
        inner.transport.close().await
    }
}

fn reply_to_server_request(method: &str, id: Value) -> Value {
    if method == "ping" {
        json!({ "jsonrpc": "2.0", "id": id, "result": {} })
    } else {
        log::debug!("Rejecting unsupported MCP server request: {}", method);
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": format!("Method not found: {}", method) }
        })
    }
}

/// Convert one raw `tools/list` entry. `name` is mandatory.
pub(crate) fn parse_tool_descriptor(raw: Value) -> HarnessResult<ToolDescriptor> {
    let has_name = raw
        .get("name")
        .and_then(|n| n.as_str())
        .map(|n| !n.trim().is_empty())
        .unwrap_or(false);
    if !has_name {
        return Err(HarnessError::ToolDiscovery(format!("Tool entry without a name: {}", raw)));
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| HarnessError::ToolDiscovery(format!("Malformed tool entry {}: {}", raw, e)))
}

impl ToolProvider for McpClient {
    async fn list_tools(&self) -> HarnessResult<Vec<ToolDescriptor>> {
        let raw = self
            .list_tool_definitions()
            .await
            .map_err(|e| HarnessError::ToolDiscovery(format!("{:#}", e)))?;
        raw.into_iter().map(parse_tool_descriptor).collect()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> HarnessResult<Value> {
        self.initialize()
            .await
            .map_err(|e| HarnessError::Invocation(format!("{:#}", e)))?;
        let params = json!({
            "name": name,
            "arguments": arguments
        });
        self.request("tools/call", Some(params))
            .await
            .map_err(|e| HarnessError::Invocation(format!("tools/call {} failed: {:#}", name, e)))
    }
}
