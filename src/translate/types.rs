//! Wire types for the OpenAI-style chat completions dialect.
//!
//! [`ChatRequest`] is what clients send us; [`UpstreamRequest`] is what we send
//! to DeepSeek. Fields the proxy never interprets stay raw JSON so a value of
//! the wrong type reaches the upstream, which owns validation. Responses are
//! never typed: they are relayed as bytes or as an opaque JSON document.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Inbound request (what clients send US)
// ---------------------------------------------------------------------------

/// Every field is `None` when absent and `Some(Value::Null)` when sent as `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Accepted for compatibility, never forwarded.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub model: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub messages: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub stream: Option<Value>,
    /// Legacy function-calling declarations.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub functions: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    /// Collapsed by [`convert_tool_choice`](super::request::convert_tool_choice).
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<Value>,
}

/// Keeps an explicit `null` as `Some(Value::Null)`; `default` covers absence.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl ChatRequest {
    pub fn is_streaming(&self) -> bool {
        self.stream.as_ref().is_some_and(is_truthy)
    }

    /// Number of messages for logging; `0` when `messages` is not an array.
    pub fn message_count(&self) -> usize {
        self.messages
            .as_ref()
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

/// JavaScript-style truthiness, as OpenAI-dialect clients expect.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Outbound request (what we send TO DeepSeek)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamRequest {
    pub model: String,
    pub messages: Value,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    pub tool_choice: ToolChoiceMode,
}

/// An assistant tool call as DeepSeek expects it. Parts the client left out
/// stay out; `arguments` is an opaque JSON-encoded string, never parsed here.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(rename = "type")]
    pub call_type: &'static str,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// Legacy function descriptor wrapped into the tool convention.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: Value,
}

/// The only tool-choice values DeepSeek accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceMode {
    None,
    Auto,
}

impl ToolChoiceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Auto => "auto",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_explicit_null_is_kept_apart_from_absence() {
        let req: ChatRequest =
            serde_json::from_value(json!({"temperature": null, "messages": []})).unwrap();

        assert_eq!(req.temperature, Some(Value::Null));
        assert!(req.max_tokens.is_none());
        assert!(req.stream.is_none());
    }

    #[test]
    fn test_mistyped_fields_deserialize() {
        let req: ChatRequest = serde_json::from_value(json!({
            "model": 7,
            "messages": "not a list",
            "stream": "yes",
            "temperature": "0.7",
            "max_tokens": -1,
            "tools": {"oops": true}
        }))
        .unwrap();

        assert!(req.is_streaming());
        assert_eq!(req.message_count(), 0);
        assert_eq!(req.max_tokens, Some(json!(-1)));
    }

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(1), json!("0"), json!([]), json!({})] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }
}
