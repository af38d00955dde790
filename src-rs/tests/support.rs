//! Test doubles shared by the unit tests.

use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{HarnessError, HarnessResult};
use crate::llm::models::provider_base::{ExecutionSettings, Message, ProviderClient};
use crate::llm::tools::mcp::transport::McpTransport;
use crate::llm::tools::mcp::ToolProvider;
use crate::llm::tools::tool_base::ToolDescriptor;

/// What the model was sent on one round trip.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub temperature: f32,
}

/// Chat client that answers from a fixed script.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<HarnessResult<Value>>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<HarnessResult<Value>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ProviderClient for ScriptedModel {
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
        settings: &ExecutionSettings,
    ) -> HarnessResult<Value> {
        let tool_names = tools
            .unwrap_or_default()
            .iter()
            .filter_map(|t| t.pointer("/function/name").and_then(|n| n.as_str()))
            .map(str::to_string)
            .collect();
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: messages.to_vec(),
            tool_names,
            temperature: settings.temperature,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(HarnessError::Invocation("script exhausted".to_string())))
    }
}

pub fn text_reply(content: &str) -> HarnessResult<Value> {
    Ok(json!({
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    }))
}

/// `calls` are `(id, function name, JSON-encoded arguments)`.
pub fn tool_call_reply(calls: &[(&str, &str, &str)]) -> HarnessResult<Value> {
    let tool_calls: Vec<Value> = calls
        .iter()
        .map(|(id, name, args)| {
            json!({
                "id": id,
                "type": "function",
                "function": { "name": name, "arguments": args }
            })
        })
        .collect();
    Ok(json!({
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": null, "tool_calls": tool_calls },
            "finish_reason": "tool_calls"
        }]
    }))
}

pub fn descriptor(name: &str, description: &str) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        parameters: json!({
            "type": "object",
            "properties": { "url": { "type": "string" } }
        }),
    }
}

/// In-memory tool server.
#[derive(Default)]
pub struct FakeToolProvider {
    pub descriptors: Vec<ToolDescriptor>,
    pub list_error: Option<String>,
    /// `list_tools` never completes.
    pub list_hangs: bool,
    pub list_calls: AtomicUsize,
    pub calls: Mutex<Vec<(String, Value)>>,
}

impl FakeToolProvider {
    pub fn with_tools(descriptors: Vec<ToolDescriptor>) -> Self {
        Self {
            descriptors,
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            list_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            list_hangs: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ToolProvider for FakeToolProvider {
    async fn list_tools(&self) -> HarnessResult<Vec<ToolDescriptor>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.list_hangs {
            std::future::pending::<()>().await;
        }
        match &self.list_error {
            Some(message) => Err(HarnessError::ToolDiscovery(message.clone())),
            None => Ok(self.descriptors.clone()),
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> HarnessResult<Value> {
        self.calls.lock().unwrap().push((name.to_string(), arguments.clone()));
        Ok(json!({
            "content": [{ "type": "text", "text": format!("{} ok: {}", name, arguments) }],
            "isError": false
        }))
    }
}

type Responder = Box<dyn FnMut(&Value) -> Vec<Value> + Send>;

/// Transport whose server side is a closure: every message the client sends
/// is handed to `responder`, and whatever it returns is queued for reading.
pub struct ScriptedTransport {
    responder: Responder,
    incoming: VecDeque<String>,
    pub sent: Arc<Mutex<Vec<Value>>>,
    pub started: Arc<AtomicBool>,
    pub closed: Arc<AtomicBool>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&Value) -> Vec<Value> + Send + 'static,
    {
        Self {
            responder: Box::new(responder),
            incoming: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            started: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queue a raw line ahead of any scripted reply.
    pub fn push_raw(&mut self, line: &str) {
        self.incoming.push_back(line.to_string());
    }
}

impl McpTransport for ScriptedTransport {
    fn start(&mut self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn send(&mut self, payload: String) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let message: Value = serde_json::from_str(&payload)?;
            for reply in (self.responder)(&message) {
                self.incoming.push_back(reply.to_string());
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        })
    }

    fn next_message(&mut self) -> BoxFuture<'_, anyhow::Result<String>> {
        Box::pin(async move {
            self.incoming
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no scripted message"))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Standard reply for a request, or nothing for notifications.
pub fn result_for(request: &Value, result: Value) -> Vec<Value> {
    match request.get("id") {
        Some(id) => vec![json!({ "jsonrpc": "2.0", "id": id, "result": result })],
        None => Vec::new(),
    }
}

pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": { "tools": {} },
        "serverInfo": { "name": "fake-browser", "version": "1.0.0" }
    })
}

/// One request as seen by [`MockHttpServer`]. Header names are lowercased.
#[derive(Debug, Clone)]
pub struct HttpExchange {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpExchange {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

pub struct HttpReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpReply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self::status(status)
            .with_header("Content-Type", "application/json")
            .with_body(body.to_string())
    }

    /// One `message` event per value.
    pub fn sse(events: &[Value]) -> Self {
        let body: String = events
            .iter()
            .map(|e| format!("event: message\ndata: {}\n\n", e))
            .collect();
        Self::status(200)
            .with_header("Content-Type", "text/event-stream")
            .with_body(body)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = body;
        self
    }

    fn to_bytes(&self) -> Vec<u8> {
        let reason = reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown");
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, reason);
        for (name, value) in &self.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        out.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", self.body.len()));
        out.push_str(&self.body);
        out.into_bytes()
    }
}

/// Loopback HTTP/1.1 server answering every request through `handler`.
/// Each connection carries one request and is closed after the reply.
pub struct MockHttpServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<HttpExchange>>>,
}

impl MockHttpServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&HttpExchange) -> HttpReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    if let Some(exchange) = read_http_request(&mut socket).await {
                        let reply = handler(&exchange);
                        recorded.lock().unwrap().push(exchange);
                        let _ = socket.write_all(&reply.to_bytes()).await;
                        let _ = socket.shutdown().await;
                    }
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<HttpExchange> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_http_request(socket: &mut TcpStream) -> Option<HttpExchange> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(HttpExchange {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
