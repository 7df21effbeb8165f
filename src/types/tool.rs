//! Tool selection passed to the primary backend.

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

/// The `tool_choice` field of a primary-backend request.
///
/// Only `"auto"`, `"none"`, and a well-formed function choice object survive; anything
/// else the caller sends collapses to [`ToolChoice::Auto`] so malformed input never
/// reaches the backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    /// A structured function choice, kept exactly as the caller supplied it.
    Function(Value),
}

impl ToolChoice {
    /// Force a specific function by name, in the `{"type":"function","function":{"name":..}}` form.
    pub fn function(name: impl Into<String>) -> Self {
        ToolChoice::Function(json!({
            "type": "function",
            "function": { "name": name.into() }
        }))
    }

    /// Validate a caller-supplied value, falling back to `Auto`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) if s == "auto" => ToolChoice::Auto,
            Value::String(s) if s == "none" => ToolChoice::None,
            Value::Object(_) if is_function_choice(value) => ToolChoice::Function(value.clone()),
            _ => ToolChoice::Auto,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ToolChoice::Auto => Value::String("auto".into()),
            ToolChoice::None => Value::String("none".into()),
            ToolChoice::Function(v) => v.clone(),
        }
    }
}

// Accepts both the chat-completions shape (`function.name`) and the flat responses shape (`name`).
fn is_function_choice(value: &Value) -> bool {
    if value.get("type").and_then(Value::as_str) != Some("function") {
        return false;
    }
    let name = value
        .get("function")
        .and_then(|f| f.get("name"))
        .or_else(|| value.get("name"))
        .and_then(Value::as_str);
    matches!(name, Some(n) if !n.trim().is_empty())
}

impl Serialize for ToolChoice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ToolChoice::Auto => serializer.serialize_str("auto"),
            ToolChoice::None => serializer.serialize_str("none"),
            ToolChoice::Function(v) => v.serialize(serializer),
        }
    }
}
