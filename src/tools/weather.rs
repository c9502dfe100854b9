/// Weather Tool Implementation
///
/// Mock `get-weather` tool. It answers every city with the same canned report;
/// no weather service is contacted.

use serde_json::{Map, Value};

use crate::core::error::ToolError;
use crate::core::registry::{Content, ToolDescriptor, ToolRegistry};

pub const TOOL_NAME: &str = "get-weather";

/// Descriptor advertised through `tools/list`.
pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: TOOL_NAME.to_string(),
        description: "Krijg het huidige weer voor een stad".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "Naam van de stad"
                }
            },
            "required": ["city"]
        }),
    }
}

/// Register the weather tool with the tool registry.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(descriptor(), handle);
}

/// Produce the canned report for `arguments["city"]`.
///
/// The argument is not validated: a missing or null city renders as an empty
/// name, and a non-string value renders as its JSON text.
fn handle(arguments: &Map<String, Value>) -> Result<Vec<Content>, ToolError> {
    let city = match arguments.get("city") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    Ok(vec![Content::text(format!("Het weer in {city}: Zonnig, 20°C"))])
}
