use crate::error::HarnessError;
use crate::llm::tools::mcp::{McpClient, ToolProvider};
use crate::tests::support::{initialize_result, result_for, ScriptedTransport};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;

#[cfg(test)]
mod tests {
    use super::*;

    fn method(message: &Value) -> &str {
        message.get("method").and_then(|m| m.as_str()).unwrap_or("")
    }

    /// Server with a fixed tool list; `tools/call` echoes its params.
    fn browser_server(request: &Value) -> Vec<Value> {
        match method(request) {
            "initialize" => result_for(request, initialize_result()),
            "tools/list" => result_for(
                request,
                json!({
                    "tools": [
                        {
                            "name": "browser_navigate",
                            "description": "Navigate to a URL",
                            "inputSchema": {
                                "type": "object",
                                "properties": { "url": { "type": "string" } },
                                "required": ["url"]
                            }
                        },
                        { "name": "browser_snapshot" }
                    ]
                }),
            ),
            "tools/call" => result_for(
                request,
                json!({ "content": [{ "type": "text", "text": request["params"].to_string() }] }),
            ),
            _ => Vec::new(),
        }
    }

    #[tokio::test]
    async fn list_tools_runs_handshake_first() {
        let transport = ScriptedTransport::new(browser_server);
        let sent = transport.sent.clone();
        let started = transport.started.clone();
        let client = McpClient::with_transport(Box::new(transport));

        let tools = client.list_tools().await.unwrap();

        assert!(started.load(Ordering::SeqCst));
        let sent = sent.lock().unwrap().clone();
        let methods: Vec<&str> = sent.iter().map(method).collect();
        assert_eq!(methods, vec!["initialize", "notifications/initialized", "tools/list"]);
        assert_eq!(sent[0]["params"]["protocolVersion"], "2024-11-05");
        assert!(sent[1].get("id").is_none());

        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "browser_navigate");
        assert_eq!(tools[0].description, "Navigate to a URL");
        assert_eq!(tools[0].parameters["required"], json!(["url"]));
        assert_eq!(tools[1].description, "");
        assert_eq!(tools[1].parameters, json!({ "type": "object", "properties": {} }));
    }

    #[tokio::test]
    async fn handshake_happens_once() {
        let transport = ScriptedTransport::new(browser_server);
        let sent = transport.sent.clone();
        let client = McpClient::with_transport(Box::new(transport));

        client.list_tools().await.unwrap();
        client.list_tools().await.unwrap();

        let initializes = sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| method(m) == "initialize")
            .count();
        assert_eq!(initializes, 1);
    }

    #[tokio::test]
    async fn list_tools_follows_cursor() {
        let transport = ScriptedTransport::new(|request: &Value| match method(request) {
            "initialize" => result_for(request, initialize_result()),
            "tools/list" => match request.pointer("/params/cursor").and_then(|c| c.as_str()) {
                None => result_for(request, json!({ "tools": [{ "name": "a" }], "nextCursor": "page-2" })),
                Some("page-2") => result_for(request, json!({ "tools": [{ "name": "b" }] })),
                Some(other) => panic!("unexpected cursor {}", other),
            },
            _ => Vec::new(),
        });
        let client = McpClient::with_transport(Box::new(transport));

        let names: Vec<String> = client.list_tools().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn noise_and_server_requests_are_handled_while_waiting() {
        let mut transport = ScriptedTransport::new(|request: &Value| match method(request) {
            "initialize" => result_for(request, initialize_result()),
            "tools/list" => {
                let mut replies = vec![
                    json!({ "jsonrpc": "2.0", "method": "notifications/message", "params": { "level": "info" } }),
                    json!({ "jsonrpc": "2.0", "id": "srv-1", "method": "ping" }),
                    json!({ "jsonrpc": "2.0", "id": "srv-2", "method": "roots/list" }),
                    json!({ "jsonrpc": "2.0", "id": 999, "result": {} }),
                ];
                replies.extend(result_for(request, json!({ "tools": [{ "name": "browser_navigate" }] })));
                replies
            }
            _ => Vec::new(),
        });
        transport.push_raw("npm WARN exec The following package was not found and will be installed");
        let sent = transport.sent.clone();
        let client = McpClient::with_transport(Box::new(transport));

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);

        let sent = sent.lock().unwrap().clone();
        let ping_reply = sent.iter().find(|m| m["id"] == "srv-1").expect("ping answered");
        assert_eq!(ping_reply["result"], json!({}));
        let roots_reply = sent.iter().find(|m| m["id"] == "srv-2").expect("roots/list answered");
        assert_eq!(roots_reply["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn rpc_error_on_list_is_tool_discovery_error() {
        let transport = ScriptedTransport::new(|request: &Value| match method(request) {
            "initialize" => result_for(request, initialize_result()),
            "tools/list" => vec![json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": { "code": -32603, "message": "browser crashed" }
            })],
            _ => Vec::new(),
        });
        let client = McpClient::with_transport(Box::new(transport));

        match client.list_tools().await {
            Err(HarnessError::ToolDiscovery(msg)) => {
                assert!(msg.contains("-32603"), "{}", msg);
                assert!(msg.contains("browser crashed"), "{}", msg);
            }
            other => panic!("expected tool discovery error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn silent_server_is_tool_discovery_error() {
        let client = McpClient::with_transport(Box::new(ScriptedTransport::new(|_: &Value| Vec::new())));
        assert!(matches!(
            client.list_tools().await,
            Err(HarnessError::ToolDiscovery(_))
        ));
    }

    #[tokio::test]
    async fn nameless_tool_is_tool_discovery_error() {
        let transport = ScriptedTransport::new(|request: &Value| match method(request) {
            "initialize" => result_for(request, initialize_result()),
            "tools/list" => result_for(request, json!({ "tools": [{ "description": "mystery" }] })),
            _ => Vec::new(),
        });
        let client = McpClient::with_transport(Box::new(transport));
        assert!(matches!(
            client.list_tools().await,
            Err(HarnessError::ToolDiscovery(_))
        ));
    }

    #[tokio::test]
    async fn call_tool_sends_name_and_arguments() {
        let transport = ScriptedTransport::new(browser_server);
        let sent = transport.sent.clone();
        let client = McpClient::with_transport(Box::new(transport));

        let result = client
            .call_tool("browser_navigate", json!({ "url": "https://www.bing.com/news" }))
            .await
            .unwrap();

        let echoed: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(echoed["name"], "browser_navigate");
        assert_eq!(echoed["arguments"]["url"], "https://www.bing.com/news");
        assert_eq!(sent.lock().unwrap().last().map(|m| method(m).to_string()).as_deref(), Some("tools/call"));
    }

    #[tokio::test]
    async fn call_tool_failure_is_invocation_error() {
        let transport = ScriptedTransport::new(|request: &Value| match method(request) {
            "initialize" => result_for(request, initialize_result()),
            "tools/call" => vec![json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": { "code": -32602, "message": "Unknown tool" }
            })],
            _ => Vec::new(),
        });
        let client = McpClient::with_transport(Box::new(transport));
        assert!(matches!(
            client.call_tool("nope", json!({})).await,
            Err(HarnessError::Invocation(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_closes_only_a_started_transport() {
        let transport = ScriptedTransport::new(browser_server);
        let closed = transport.closed.clone();
        let client = McpClient::with_transport(Box::new(transport));

        client.shutdown().await.unwrap();
        assert!(!closed.load(Ordering::SeqCst));

        client.list_tools().await.unwrap();
        client.shutdown().await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn shutdown_closes_transport_left_mid_handshake() {
        let transport = ScriptedTransport::new(|_: &Value| Vec::new());
        let started = transport.started.clone();
        let closed = transport.closed.clone();
        let client = McpClient::with_transport(Box::new(transport));

        assert!(client.initialize().await.is_err());
        assert!(started.load(Ordering::SeqCst));

        client.shutdown().await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }
}
