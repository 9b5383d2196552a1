//! Tool trait: the abstraction over agent capabilities.
//!
//! Every tool accepts a single opaque string and produces a single string.
//! Tools that need structured input parse a JSON string themselves. This
//! uniform contract lets the engine treat a calculator and a calendar the
//! same way.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::ToolError;
use crate::message::ToolCallRequest;
use crate::provider::ToolDefinition;

/// What a tool invocation produced. Failures are already rendered as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// The result of one tool call, paired with the request it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn from_output(request: &ToolCallRequest, output: ToolOutput) -> Self {
        Self {
            tool_call_id: request.id.clone(),
            tool_name: request.tool_name.clone(),
            output: output.text,
            is_error: output.is_error,
        }
    }

    pub fn from_error(request: &ToolCallRequest, error: &ToolError) -> Self {
        Self::from_output(request, ToolOutput::error(error.to_string()))
    }
}

/// The core Tool trait.
///
/// Implementors provide `run`; callers use `invoke`, which never fails.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator", "weather").
    fn name(&self) -> &str;

    /// A description of the accepted input and behaviour (sent to the LLM).
    fn description(&self) -> &str;

    /// Do the work. Errors are turned into text by [`Tool::invoke`].
    async fn run(&self, input: &str, ctx: &RequestContext) -> Result<String, ToolError>;

    /// Run the tool and fold any failure into an error output.
    async fn invoke(&self, input: &str, ctx: &RequestContext) -> ToolOutput {
        match self.run(input, ctx).await {
            Ok(text) => ToolOutput::ok(text),
            Err(e) => {
                debug!(tool = %self.name(), error = %e, "Tool returned an error");
                ToolOutput::error(e.to_string())
            }
        }
    }

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "The tool input, formatted as the tool description explains"
                    }
                },
                "required": ["input"]
            }),
        }
    }
}

/// A registry of available tools.
///
/// Built once at startup and shared read-only (`Arc<ToolRegistry>`) between
/// concurrent turns.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// Get all tool definitions (for sending to the LLM), sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
