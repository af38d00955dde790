use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use super::tool_base::Tool;
use crate::error::{HarnessError, HarnessResult};

/// Separator between namespace and tool name in the name the model sees.
pub const NAMESPACE_SEPARATOR: char = '-';

pub struct RegisteredTool {
    pub namespace: String,
    pub tool: Arc<dyn Tool>,
}

impl RegisteredTool {
    pub fn qualified_name(&self) -> String {
        format!("{}{}{}", self.namespace, NAMESPACE_SEPARATOR, self.tool.name())
    }
}

/// Callable functions offered to the model, grouped by namespace
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tools` under `namespace`. Either all of them are added or,
    /// on a name clash, none.
    pub fn add_plugin(&mut self, namespace: &str, tools: Vec<Arc<dyn Tool>>) -> HarnessResult<usize> {
        let mut seen: HashSet<String> = self.entries.iter().map(|e| e.qualified_name()).collect();
        let mut staged = Vec::with_capacity(tools.len());

        for tool in tools {
            let entry = RegisteredTool {
                namespace: namespace.to_string(),
                tool,
            };
            let qualified = entry.qualified_name();
            if !seen.insert(qualified.clone()) {
                return Err(HarnessError::ToolDiscovery(format!(
                    "Duplicate function name: {}",
                    qualified
                )));
            }
            staged.push(entry);
        }

        let added = staged.len();
        self.entries.extend(staged);
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.entries.iter()
    }

    /// Look up by the name the model sees (`Namespace-tool`).
    pub fn find(&self, qualified_name: &str) -> Option<&RegisteredTool> {
        self.entries
            .iter()
            .find(|e| e.qualified_name() == qualified_name)
    }

    pub fn tool_definitions(&self) -> Vec<Value> {
        self.entries
            .iter()
            .map(|e| e.tool.to_tool_definition(&e.qualified_name()))
            .collect()
    }
}
