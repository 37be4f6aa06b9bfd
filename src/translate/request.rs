//! Translate OpenAI-style chat requests into DeepSeek chat requests.
//!
//! Legacy function calling (`functions`, role `function`) is folded into the
//! tool convention, assistant tool calls are normalized, and the tool-choice
//! directive is narrowed to the two values DeepSeek understands. None of these
//! functions fail: malformed input is forwarded and left for the upstream to
//! reject.

use serde_json::{Map, Value};

use super::types::{
    is_truthy, ChatRequest, FunctionTool, ToolCall, ToolCallFunction, ToolChoiceMode,
    UpstreamRequest,
};

/// Build the upstream request. The client's `model` is replaced by `chat_model`.
pub fn to_upstream(req: ChatRequest, chat_model: &str) -> UpstreamRequest {
    let stream = req.is_streaming();
    let tool_choice = convert_tool_choice(req.tool_choice.as_ref());
    let tools = merge_tools(req.tools, req.functions);
    let messages = match req.messages {
        Some(Value::Array(messages)) => Value::Array(convert_messages(messages)),
        Some(other) => other,
        None => Value::Array(Vec::new()),
    };

    UpstreamRequest {
        model: chat_model.to_string(),
        messages,
        stream,
        temperature: req.temperature,
        max_tokens: req.max_tokens,
        tools,
        tool_choice,
    }
}

/// Normalize each message. Order and length are preserved; anything that is
/// not an object passes through as is.
pub fn convert_messages(messages: Vec<Value>) -> Vec<Value> {
    messages.into_iter().map(convert_message).collect()
}

fn convert_message(msg: Value) -> Value {
    let Value::Object(mut msg) = msg else {
        return msg;
    };

    match msg.get("role").and_then(Value::as_str) {
        Some("assistant") => {
            if let Some(Value::Array(calls)) = msg.get_mut("tool_calls") {
                for call in calls.iter_mut() {
                    *call = normalize_tool_call(call);
                }
            }
        }
        Some("function") => {
            msg.insert("role".to_string(), Value::from("tool"));
        }
        _ => {}
    }

    Value::Object(msg)
}

/// Keep only `id`, `function.name` and `function.arguments`; force the type.
fn normalize_tool_call(call: &Value) -> Value {
    let normalized = ToolCall {
        id: call.get("id").cloned(),
        call_type: "function",
        function: ToolCallFunction {
            name: call.pointer("/function/name").cloned(),
            arguments: call.pointer("/function/arguments").cloned(),
        },
    };
    serde_json::to_value(normalized).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// Collapse any tool-choice directive into `none` or `auto`.
///
/// DeepSeek cannot pin a specific function, so a `{"type": "function", ...}`
/// selector widens to `auto`. Everything unrecognized becomes `none`.
pub fn convert_tool_choice(choice: Option<&Value>) -> ToolChoiceMode {
    match choice {
        Some(Value::String(s)) if s == "auto" => ToolChoiceMode::Auto,
        Some(Value::Object(map)) if map.get("type").and_then(Value::as_str) == Some("function") => {
            ToolChoiceMode::Auto
        }
        _ => ToolChoiceMode::None,
    }
}

/// A truthy `tools` is forwarded untouched. Otherwise each legacy function
/// descriptor is wrapped as a tool; a `functions` value that is not an array
/// goes out as is. Neither means no field.
fn merge_tools(tools: Option<Value>, functions: Option<Value>) -> Option<Value> {
    if let Some(tools) = tools.filter(is_truthy) {
        return Some(tools);
    }

    match functions.filter(is_truthy)? {
        Value::Array(functions) => Some(Value::Array(
            functions.into_iter().map(wrap_function).collect(),
        )),
        other => Some(other),
    }
}

fn wrap_function(function: Value) -> Value {
    let tool = FunctionTool {
        tool_type: "function",
        function,
    };
    serde_json::to_value(tool).unwrap_or_else(|_| Value::Object(Map::new()))
}
