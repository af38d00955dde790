use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

use crate::error::HarnessResult;
use crate::llm::utils::serde_util::{deserialize_null_as_empty, deserialize_string_lax};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "deserialize_tool_calls")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

fn deserialize_tool_calls<'de, D>(deserializer: D) -> Result<Vec<ToolCall>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<ToolCall>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content.into())
    }

    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn plain(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// A function call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object
    #[serde(default, deserialize_with = "deserialize_string_lax")]
    pub arguments: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionChoice {
    /// Offer registered functions and invoke whatever the model asks for.
    Auto,
    /// Never offer functions.
    None,
}

/// Per-request generation settings
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSettings {
    pub temperature: f32,
    pub function_choice: FunctionChoice,
    /// Model round trips that may still offer functions. Once used up the
    /// model is asked without functions so it has to answer.
    pub max_auto_invoke_attempts: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            function_choice: FunctionChoice::Auto,
            max_auto_invoke_attempts: 40,
        }
    }
}

pub trait ProviderClient: Send + Sync {
    /// One chat-completions round trip. Returns the raw completion JSON.
    fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
        settings: &ExecutionSettings,
    ) -> impl Future<Output = HarnessResult<Value>> + Send;
}
