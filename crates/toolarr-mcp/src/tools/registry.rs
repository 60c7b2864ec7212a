//! Name-keyed table of registered tools.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::{Tool, ToolHandler};
use crate::error::RegistryError;

/// MCP tool info for `tools/list` responses.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Registry of tools, populated once at startup and read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tool, replacing any existing tool with the same name in place.
    ///
    /// The schema must be a JSON object; no other shape checks are made.
    pub fn register(&mut self, tool: Tool) -> Result<(), RegistryError> {
        if !tool.input_schema.is_object() {
            return Err(RegistryError::SchemaNotObject(tool.name));
        }

        if let Some(&slot) = self.index.get(&tool.name) {
            tracing::debug!(tool = %tool.name, "Replacing registered tool");
            self.tools[slot] = tool;
        } else {
            self.index.insert(tool.name.clone(), self.tools.len());
            self.tools.push(tool);
        }
        Ok(())
    }

    /// All tools' public descriptions, in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect()
    }

    /// Look up a tool's handler by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.index.get(name).map(|&slot| Arc::clone(&self.tools[slot].handler))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.tools.len()).finish()
    }
}
