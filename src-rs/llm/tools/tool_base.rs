use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::HarnessResult;

/// Name, description and parameter schema of a discovered tool.
///
/// Carried verbatim from the tool server into the function registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub parameters: Value,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// A function the model may call
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Run the tool with the model-supplied argument object and return the text
    /// handed back to the model.
    fn invoke(&self, arguments: Value) -> BoxFuture<'_, HarnessResult<String>>;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn description(&self) -> &str {
        &self.descriptor().description
    }

    /// OpenAI `tools` entry, exposed as `qualified_name`.
    fn to_tool_definition(&self, qualified_name: &str) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": qualified_name,
                "description": self.description(),
                "parameters": self.descriptor().parameters
            }
        })
    }
}
