//! Tool catalogue shared by the HTTP and stdio transports
//!
//! Built once at startup and handed out behind an `Arc`; nothing mutates it afterwards.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::tools::build_tools_list;

/// Contract of a single tool parameter as published in the tool listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
}

impl ParameterDefinition {
    pub fn new(kind: &str, description: &str, required: bool) -> Self {
        Self {
            kind: kind.to_string(),
            description: description.to_string(),
            required,
            default: None,
            allowed_values: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_allowed_values(mut self, values: &[&str]) -> Self {
        self.allowed_values = Some(
            values
                .iter()
                .map(|value| Value::String((*value).to_string()))
                .collect(),
        );
        self
    }
}

/// A named, schema-described operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: String,
    pub description: String,
    pub parameters: BTreeMap<String, ParameterDefinition>,
}

impl Tool {
    pub fn function(
        name: &str,
        description: &str,
        parameters: impl IntoIterator<Item = (&'static str, ParameterDefinition)>,
    ) -> Self {
        Self {
            kind: "function".to_string(),
            function: name.to_string(),
            description: description.to_string(),
            parameters: parameters
                .into_iter()
                .map(|(name, definition)| (name.to_string(), definition))
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every tool this server knows how to execute.
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        for tool in build_tools_list() {
            registry.register(tool);
        }
        info!(tools = registry.len(), "initialized tool registry");
        registry
    }

    /// Registers `tool` under its function name. A later registration with the same
    /// name replaces the earlier one but keeps its listing position.
    pub fn register(&mut self, tool: Tool) {
        debug!(function = %tool.function, "registered tool");
        match self.index.get(&tool.function) {
            Some(&position) => self.tools[position] = tool,
            None => {
                self.index.insert(tool.function.clone(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn lookup(&self, function: &str) -> Option<&Tool> {
        self.index.get(function).map(|&position| &self.tools[position])
    }

    pub fn contains(&self, function: &str) -> bool {
        self.index.contains_key(function)
    }

    pub fn list(&self) -> &[Tool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
