use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::OrchestrationConfig;
use crate::error::HarnessResult;
use crate::llm::agents::ChatModel;
use crate::llm::models::provider_handle::{ExecutionSettings, FunctionChoice};
use crate::llm::tools::mcp::{load_mcp_tools, ToolProvider};
use crate::llm::utils::cancel::run_cancellable;

/// One orchestration pass: discover the remote tools, expose them to the
/// model under a single namespace, then run the configured prompt.
pub struct Driver<M: ChatModel, P: ToolProvider + 'static> {
    model: M,
    tools: Arc<P>,
    orchestration: OrchestrationConfig,
}

impl<M: ChatModel, P: ToolProvider + 'static> Driver<M, P> {
    pub fn new(model: M, tools: Arc<P>, orchestration: OrchestrationConfig) -> Self {
        Self {
            model,
            tools,
            orchestration,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn tools(&self) -> &Arc<P> {
        &self.tools
    }

    pub fn orchestration(&self) -> &OrchestrationConfig {
        &self.orchestration
    }

    /// Deterministic generation with automatic function calling.
    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            temperature: 0.0,
            function_choice: FunctionChoice::Auto,
            max_auto_invoke_attempts: self.orchestration.max_auto_invoke_attempts,
        }
    }

    /// Run the pass and return the model's final answer.
    ///
    /// Nothing is registered unless discovery completes, and a cancelled token
    /// stops the pass before discovery starts.
    pub async fn run(&mut self, cancel: &CancellationToken) -> HarnessResult<String> {
        let tools = run_cancellable(cancel, load_mcp_tools(&self.tools)).await?;

        let namespace = self.orchestration.plugin_name.clone();
        let registered = self.model.functions_mut().add_plugin(&namespace, tools)?;
        log::info!("Registered {} functions under {}", registered, namespace);

        let prompt = self.orchestration.prompt.clone();
        log::info!("Prompt: {}", prompt);

        let settings = self.execution_settings();
        let result = run_cancellable(cancel, self.model.generate(&prompt, &settings, cancel)).await?;

        log::info!("\n\n{}\n{}", prompt, result);
        Ok(result)
    }

    /// [`Driver::run`] with every failure logged instead of returned.
    pub async fn execute(&mut self, cancel: &CancellationToken) -> Option<String> {
        match self.run(cancel).await {
            Ok(result) => Some(result),
            Err(e) if e.is_cancelled() => {
                log::warn!("{}: orchestration stopped by shutdown signal", e.kind());
                None
            }
            Err(e) => {
                log::error!("{}: {}", e.kind(), e);
                None
            }
        }
    }
}
