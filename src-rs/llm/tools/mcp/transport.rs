use anyhow::{anyhow, bail, Context, Result};
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::llm::utils::sse::sse_data_stream;

/// Moves serialized JSON-RPC messages between the client and an MCP server.
pub trait McpTransport: Send {
    fn start(&mut self) -> BoxFuture<'_, Result<()>>;
    fn send(&mut self, payload: String) -> BoxFuture<'_, Result<()>>;
    fn next_message(&mut self) -> BoxFuture<'_, Result<String>>;
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Child process speaking newline-delimited JSON over stdin/stdout
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    inherit_stderr: bool,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    reader: Option<Lines<BufReader<ChildStdout>>>,
}

impl StdioTransport {
    pub fn new(command: String, args: Vec<String>, env: HashMap<String, String>, inherit_stderr: bool) -> Self {
        Self {
            command,
            args,
            env,
            inherit_stderr,
            child: None,
            stdin: None,
            reader: None,
        }
    }

    fn build_command(&self) -> Command {
        // npx and friends are .cmd shims on Windows
        #[cfg(windows)]
        let mut cmd = {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        };
        #[cfg(not(windows))]
        let mut cmd = Command::new(&self.command);

        cmd.args(&self.args);
        cmd.envs(&self.env);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        if self.inherit_stderr {
            cmd.stderr(Stdio::inherit());
        } else {
            cmd.stderr(Stdio::null());
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

impl McpTransport for StdioTransport {
    fn start(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            log::info!("Starting MCP server: {} {}", self.command, self.args.join(" "));
            let mut child = self
                .build_command()
                .spawn()
                .with_context(|| format!("Failed to spawn MCP server `{}`", self.command))?;

            let stdin = child.stdin.take().ok_or_else(|| anyhow!("No stdin"))?;
            let stdout = child.stdout.take().ok_or_else(|| anyhow!("No stdout"))?;

            self.child = Some(child);
            self.stdin = Some(stdin);
            self.reader = Some(BufReader::new(stdout).lines());
            Ok(())
        })
    }

    fn send(&mut self, payload: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let stdin = self.stdin.as_mut().ok_or_else(|| anyhow!("Transport not started"))?;
            stdin.write_all(payload.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
            Ok(())
        })
    }

    fn next_message(&mut self) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let reader = self.reader.as_mut().ok_or_else(|| anyhow!("Transport not started"))?;
            match reader.next_line().await {
                Ok(Some(line)) => Ok(line),
                Ok(None) => Err(anyhow!("MCP Stdio stream ended")),
                Err(e) => Err(anyhow!("Failed to read from MCP Stdio: {}", e)),
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.stdin = None;
            self.reader = None;
            if let Some(mut child) = self.child.take() {
                let _ = child.kill().await;
                log::debug!("MCP server process stopped");
            }
            Ok(())
        })
    }
}

/// MCP streamable HTTP: every message is a POST; the reply comes back either
/// as a JSON body or as an SSE stream on that same response.
pub struct StreamableHttpTransport {
    mcp_url: String,
    headers: HashMap<String, String>,
    client: Option<reqwest::Client>,
    session_id: Option<String>,
    pending: VecDeque<String>,
}

impl StreamableHttpTransport {
    pub fn new(mcp_url: String, headers: HashMap<String, String>) -> Self {
        Self {
            mcp_url,
            headers,
            client: None,
            session_id: None,
            pending: VecDeque::new(),
        }
    }

    fn request(&self, method: reqwest::Method) -> Result<reqwest::RequestBuilder> {
        let client = self.client.as_ref().ok_or_else(|| anyhow!("Transport not started"))?;
        let mut req_builder = client.request(method, &self.mcp_url);
        for (k, v) in &self.headers {
            req_builder = req_builder.header(k, v);
        }
        if let Some(sid) = &self.session_id {
            req_builder = req_builder.header("Mcp-Session-Id", sid);
        }
        Ok(req_builder)
    }
}

impl McpTransport for StreamableHttpTransport {
    fn start(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let client = reqwest::Client::builder()
                .user_agent(concat!("browserpilot/", env!("CARGO_PKG_VERSION")))
                .tcp_keepalive(Some(std::time::Duration::from_secs(60)))
                .build()
                .context("Failed to build MCP HTTP client")?;
            self.client = Some(client);
            log::info!("Using MCP streamable HTTP endpoint: {}", self.mcp_url);
            Ok(())
        })
    }

    fn send(&mut self, payload: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let res = self
                .request(reqwest::Method::POST)?
                .header("Accept", "application/json, text/event-stream")
                .header("Content-Type", "application/json")
                .body(payload)
                .send()
                .await
                .with_context(|| format!("Failed to reach MCP endpoint {}", self.mcp_url))?;

            if let Some(sid) = res.headers().get("Mcp-Session-Id").and_then(|v| v.to_str().ok()) {
                if self.session_id.as_deref() != Some(sid) {
                    log::debug!("MCP session id: {}", sid);
                    self.session_id = Some(sid.to_string());
                }
            }

            let status = res.status();
            if !status.is_success() {
                let text = res.text().await.unwrap_or_default();
                bail!("MCP request failed: {} ({}) - {}", self.mcp_url, status, text);
            }
            if status == reqwest::StatusCode::ACCEPTED {
                return Ok(());
            }

            let is_event_stream = res
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|ct| ct.starts_with("text/event-stream"))
                .unwrap_or(false);

            if is_event_stream {
                let stream = tokio_stream::StreamExt::map(res.bytes_stream(), |chunk| {
                    chunk.context("Failed to read MCP SSE chunk")
                });
                let mut events = sse_data_stream(Box::pin(stream));
                while let Some(data) = tokio_stream::StreamExt::next(&mut events).await {
                    self.pending.push_back(data?);
                }
            } else {
                let text = res.text().await?;
                if !text.trim().is_empty() {
                    self.pending.push_back(text);
                }
            }
            Ok(())
        })
    }

    fn next_message(&mut self) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            self.pending
                .pop_front()
                .ok_or_else(|| anyhow!("MCP server sent no response"))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.session_id.is_some() {
                let _ = self.request(reqwest::Method::DELETE)?.send().await;
            }
            self.pending.clear();
            self.client = None;
            Ok(())
        })
    }
}
