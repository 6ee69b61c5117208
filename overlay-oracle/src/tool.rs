use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of the tool catalogue handed to the oracle alongside the
/// conversation. `parameters` is a JSON Schema object, the same shape every
/// mainstream tool-calling API expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self { name: name.into(), description: description.into(), parameters }
    }
}

/// A tool call the oracle asked the caller to run, once its argument buffer
/// is a complete JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    /// Parses `arguments` as JSON. Used both to dispatch the call and to
    /// decide, mid-stream, whether a partial argument buffer is already a
    /// complete object (the interruption precondition).
    pub fn arguments_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

/// True if `fragment` parses as a complete JSON value — the same check the
/// reasoning loop uses to decide whether an in-flight tool call is safe to
/// interrupt.
pub fn is_complete_json_object(fragment: &str) -> bool {
    matches!(serde_json::from_str::<Value>(fragment), Ok(Value::Object(_)))
}
