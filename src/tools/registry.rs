//! Named tool registry — registration, schema listing, invocation by name.

use std::sync::{Arc, RwLock};

use tracing::warn;

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolExecutionContext};
use crate::error::{PalaverError, Result};
use crate::model::ToolDefinition;

/// Holds named callable tools with declared parameter schemas.
///
/// Shared read-mostly across concurrent turns: populated once at startup,
/// then only read. Tools are invoked by name and never escape the registry.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<Vec<Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails with `DuplicateTool` if the name is taken;
    /// registration never overwrites.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let mut tools = self.tools.write().expect("tool registry lock poisoned");
        if tools.iter().any(|t| t.name() == tool.name()) {
            return Err(PalaverError::DuplicateTool(tool.name().to_string()));
        }
        tools.push(tool);
        Ok(())
    }

    /// All registered schemas, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters().schema.clone(),
            })
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.read().expect("tool registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke a tool by name.
    ///
    /// Fails with `UnknownTool` if not registered and `ToolExecution`
    /// wrapping the underlying fault if the callable errors; otherwise
    /// returns the callable's result unchanged.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
        ctx: ToolExecutionContext,
    ) -> Result<serde_json::Value> {
        let tool = {
            let tools = self.tools.read().expect("tool registry lock poisoned");
            tools.iter().find(|t| t.name() == name).cloned()
        };
        let Some(tool) = tool else {
            return Err(PalaverError::UnknownTool(name.to_string()));
        };

        let args = ToolArguments::new(arguments);
        tool.execute(&args, &ctx).await.map_err(|e| match e {
            err @ PalaverError::ToolExecution { .. } => err,
            other => {
                warn!(tool = name, error = %other, "tool execution failed");
                PalaverError::ToolExecution {
                    tool_name: name.to_string(),
                    message: other.to_string(),
                }
            }
        })
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .tools
            .read()
            .expect("tool registry lock poisoned")
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}
