use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{HarnessError, HarnessResult};
use crate::llm::models::provider_handle::{ExecutionSettings, FunctionChoice, Message, ProviderClient};
use crate::llm::tools::tool_base::Tool;
use crate::llm::tools::tool_registry::ToolRegistry;
use crate::llm::utils::cancel::run_cancellable;
use crate::llm::utils::string_util::truncate_utf8_with_ellipsis;

/// A chat model with a function registry that resolves function calls on its own.
pub trait ChatModel: Send + Sync {
    fn functions(&self) -> &ToolRegistry;

    fn functions_mut(&mut self) -> &mut ToolRegistry;

    /// Send `prompt`, run every function call the model requests, and return
    /// the model's final text.
    fn generate(
        &self,
        prompt: &str,
        settings: &ExecutionSettings,
        cancel: &CancellationToken,
    ) -> impl Future<Output = HarnessResult<String>> + Send;
}

pub struct Agent<C: ProviderClient> {
    client: C,
    system_prompt: Option<String>,
    functions: ToolRegistry,
}

#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Final assistant text
    pub content: String,
    /// Whether any function was invoked
    pub tools_used: bool,
    pub tool_results: Vec<ToolExecutionResult>,
}

#[derive(Debug, Clone)]
pub struct ToolExecutionResult {
    pub tool_name: String,
    pub success: bool,
    pub result: String,
}

impl<C: ProviderClient> Agent<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            system_prompt: None,
            functions: ToolRegistry::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = if prompt.trim().is_empty() { None } else { Some(prompt) };
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn find_tool(&self, qualified_name: &str) -> Option<&Arc<dyn Tool>> {
        self.functions.find(qualified_name).map(|entry| &entry.tool)
    }

    /// Run `prompt` to completion.
    ///
    /// Function failures are handed back to the model as the call's result so it
    /// can recover. Cancellation and model request failures end the run.
    pub async fn execute(
        &self,
        prompt: &str,
        settings: &ExecutionSettings,
        cancel: &CancellationToken,
    ) -> HarnessResult<AgentResult> {
        let mut messages = Vec::new();
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));

        let definitions = self.functions.tool_definitions();
        let mut tool_results: Vec<ToolExecutionResult> = Vec::new();
        let mut rounds_with_tools = 0usize;

        loop {
            let offer_tools = settings.function_choice == FunctionChoice::Auto
                && !definitions.is_empty()
                && rounds_with_tools < settings.max_auto_invoke_attempts;
            let tools = if offer_tools { Some(definitions.as_slice()) } else { None };

            log::info!(
                "Calling LLM with {} messages ({} functions offered)",
                messages.len(),
                tools.map(|t| t.len()).unwrap_or(0)
            );
            let response = run_cancellable(cancel, self.client.chat(&messages, tools, settings)).await?;
            let reply = first_choice_message(&response)?;

            if !offer_tools || reply.tool_calls.is_empty() {
                if !reply.tool_calls.is_empty() {
                    log::warn!("Ignoring {} function calls after the invocation limit", reply.tool_calls.len());
                }
                return Ok(AgentResult {
                    content: reply.content.unwrap_or_default(),
                    tools_used: !tool_results.is_empty(),
                    tool_results,
                });
            }

            rounds_with_tools += 1;
            log::info!("Tool calls detected: {}", reply.tool_calls.len());

            let calls = reply.tool_calls.clone();
            messages.push(reply);

            for call in calls {
                let name = call.function.name.as_str();
                log::info!(
                    "Executing tool: {} with args: {}",
                    name,
                    truncate_utf8_with_ellipsis(&call.function.arguments, 500)
                );

                let (success, result) = match self.execute_tool(name, &call.function.arguments, cancel).await {
                    Ok(output) => (true, output),
                    Err(HarnessError::Cancelled) => return Err(HarnessError::Cancelled),
                    Err(e) => {
                        log::warn!("Tool {} failed: {}", name, e);
                        (false, format!("Error: {}", e))
                    }
                };
                log::debug!("Tool {} returned: {}", name, truncate_utf8_with_ellipsis(&result, 1000));

                messages.push(Message::tool(call.id.clone(), result.clone()));
                tool_results.push(ToolExecutionResult {
                    tool_name: name.to_string(),
                    success,
                    result,
                });
            }
        }
    }

    /// Invoke one registered function by the name the model sees.
    pub async fn execute_tool(
        &self,
        qualified_name: &str,
        arguments: &str,
        cancel: &CancellationToken,
    ) -> HarnessResult<String> {
        let tool = self
            .find_tool(qualified_name)
            .ok_or_else(|| HarnessError::Invocation(format!("Unknown function: {}", qualified_name)))?;

        let args: Value = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments).map_err(|e| {
                HarnessError::Invocation(format!("Invalid arguments for {}: {}", qualified_name, e))
            })?
        };

        run_cancellable(cancel, tool.invoke(args)).await
    }
}

fn first_choice_message(response: &Value) -> HarnessResult<Message> {
    let message = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| {
            HarnessError::Invocation(format!(
                "LLM response has no message: {}",
                truncate_utf8_with_ellipsis(&response.to_string(), 500)
            ))
        })?;

    if let Some(reason) = response.pointer("/choices/0/finish_reason").and_then(|r| r.as_str()) {
        log::debug!("LLM finished with reason: {}", reason);
    }

    serde_json::from_value(message.clone())
        .map_err(|e| HarnessError::Invocation(format!("Malformed LLM message: {}", e)))
}

impl<C: ProviderClient> ChatModel for Agent<C> {
    fn functions(&self) -> &ToolRegistry {
        &self.functions
    }

    fn functions_mut(&mut self) -> &mut ToolRegistry {
        &mut self.functions
    }

    async fn generate(
        &self,
        prompt: &str,
        settings: &ExecutionSettings,
        cancel: &CancellationToken,
    ) -> HarnessResult<String> {
        let result = self.execute(prompt, settings, cancel).await?;
        if result.tools_used {
            let failed = result.tool_results.iter().filter(|r| !r.success).count();
            log::info!(
                "Completed with {} function calls ({} failed)",
                result.tool_results.len(),
                failed
            );
        }
        Ok(result.content)
    }
}
