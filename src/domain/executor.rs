use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::domain::{registry::ToolRegistry, tools::ToolKind};
use crate::errors::ToolError;

/// Resolves a function name against the registry and runs the matching tool.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// `arguments` is the JSON text of the argument object.
    pub fn execute(&self, function_name: &str, arguments: &str) -> Result<Value, ToolError> {
        info!(function = %function_name, "executing tool");

        if !self.registry.contains(function_name) {
            return Err(ToolError::UnknownTool(function_name.to_string()));
        }

        let parsed: Value = serde_json::from_str(arguments)
            .map_err(|err| ToolError::InvalidArguments(err.to_string()))?;

        let Some(kind) = ToolKind::from_function_name(function_name) else {
            return Err(ToolError::ExecutionFailed(format!(
                "Tool function not implemented: {function_name}"
            )));
        };

        let outcome = kind.invoke(&parsed);
        if let Err(err) = &outcome {
            warn!(function = %function_name, error = %err, "tool execution failed");
        }
        outcome
    }
}
