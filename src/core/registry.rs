/// Tool Registry
///
/// Holds the tool descriptors advertised through `tools/list` and the handler
/// functions invoked through `tools/call`. The registry is built once at
/// startup and is read-only afterwards, so transports share it behind an `Arc`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::core::error::ToolError;

/// MCP tool definition as advertised to clients.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique tool identifier (e.g., "get-weather")
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema defining the tool's input parameters
    pub input_schema: Value,
}

/// A single content item of a tool result.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }
}

/// Parameters of a `tools/call` request.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    /// Absent and `null` both decode to an empty map.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub arguments: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Successful outcome of a tool call, in MCP wire shape.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<Content>,
    pub is_error: bool,
}

/// Tool handler function type.
///
/// The tool set is fixed at compile time, so handlers are plain function
/// pointers rather than boxed closures.
pub type ToolHandler = fn(&Map<String, Value>) -> Result<Vec<Content>, ToolError>;

/// Registry of available MCP tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with the registry.
    ///
    /// Registering a name twice replaces the earlier descriptor and handler
    /// while keeping its position in the listing.
    pub fn register(&mut self, tool: ToolDescriptor, handler: ToolHandler) {
        let name = tool.name.clone();
        match self.tools.iter_mut().find(|t| t.name == name) {
            Some(existing) => *existing = tool,
            None => self.tools.push(tool),
        }
        self.handlers.insert(name, handler);
    }

    /// All registered tools in registration order.
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Invoke the handler registered under `request.name`.
    pub fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult, ToolError> {
        let handler = self
            .handlers
            .get(&request.name)
            .ok_or_else(|| ToolError::UnknownTool(request.name.clone()))?;

        let content = handler(&request.arguments)?;
        Ok(ToolCallResult {
            content,
            is_error: false,
        })
    }
}
