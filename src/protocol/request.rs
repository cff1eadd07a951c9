// src/protocol/request.rs

use serde_json::Value;

use super::MSG_TYPE;

/// The fields of an inbound command message that the engine understands.
///
/// Extraction is type-safe but lenient: anything missing or of the wrong type
/// is simply absent, and the later pipeline stages turn that into the right
/// error reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRequest {
    pub token: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub cmd: Option<String>,
    pub params: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandRequest {
    pub fn from_value(value: &Value) -> Self {
        let attrs = value.get("attrs");
        let attr_str = |key: &str| {
            attrs
                .and_then(|a| a.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            token: value
                .get("token")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            username: attr_str("username"),
            password: attr_str("password"),
            cmd: attr_str("cmd"),
            params: attrs.map(extract_params).unwrap_or_default(),
            env: attrs.map(extract_env).unwrap_or_default(),
        }
    }
}

/// Messages without a `type` are treated as commands; any other type is not
/// ours.
pub fn is_command_message(value: &Value) -> bool {
    match value.get("type") {
        None => true,
        Some(t) => t.as_str() == Some(MSG_TYPE),
    }
}

/// The argument vector ends at the first non-string entry, the same way a
/// NULL terminates `argv`.
fn extract_params(attrs: &Value) -> Vec<String> {
    attrs
        .get("params")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map_while(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Only string values are applied; anything else is skipped.
fn extract_env(attrs: &Value) -> Vec<(String, String)> {
    attrs
        .get("env")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
