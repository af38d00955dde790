use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::driver::Driver;
use crate::error::HarnessResult;
use crate::llm::agents::Agent;
use crate::llm::models::openai::OpenAiClient;
use crate::llm::models::provider_handle::create_client;
use crate::llm::tools::mcp::McpClient;

pub type BrowserDriver = Driver<Agent<OpenAiClient>, McpClient>;

/// Wire up model client, tool client and driver. No network traffic happens here.
pub fn build_driver(config: &AppConfig) -> HarnessResult<BrowserDriver> {
    let client = create_client(&config.provider, config.request_timeout)?;

    log::info!("MCP server: {}", config.mcp_server.describe());
    let mcp = Arc::new(config.mcp_server.create_client());

    Ok(Driver::new(Agent::new(client), mcp, config.orchestration.clone()))
}

/// Token cancelled on Ctrl-C (and SIGTERM on unix).
pub fn install_shutdown_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        log::info!("Shutdown signal received");
        trigger.cancel();
    });
    token
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => Some(s),
        Err(e) => {
            log::warn!("Failed to install SIGTERM handler: {}", e);
            None
        }
    };
    let sigterm = async {
        match term.as_mut() {
            Some(s) => {
                s.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = ctrl_c() => {}
        _ = sigterm => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    ctrl_c().await
}

/// Build everything, run one pass and release the tool server.
///
/// Only construction failures are returned. The pass itself logs its own errors.
pub async fn run(config: &AppConfig) -> HarnessResult<Option<String>> {
    let mut driver = build_driver(config)?;
    let cancel = install_shutdown_signal();

    let result = driver.execute(&cancel).await;

    if let Err(e) = driver.tools().shutdown().await {
        log::warn!("Failed to stop MCP server cleanly: {:#}", e);
    }
    Ok(result)
}
