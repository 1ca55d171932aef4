//! Repair of tool arguments as models actually send them

use serde_json::{Map, Value};

use crate::ai::schema::strip_code_fences;

/// Coerce raw tool arguments into a JSON object where possible.
///
/// Handles argument text that is JSON (possibly fenced or with escaped
/// newlines), and objects wrapping a single JSON string such as
/// `{"query": "{...}"}`. `null` and blank text become `{}`.
pub fn normalize_arguments(params: Value) -> Value {
    match params {
        Value::Null => Value::Object(Map::new()),
        Value::String(raw) => parse_argument_text(&raw).unwrap_or(Value::String(raw)),
        Value::Object(map) => unwrap_single_json_field(map),
        other => other,
    }
}

fn parse_argument_text(raw: &str) -> Option<Value> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Some(Value::Object(Map::new()));
    }
    let parsed = serde_json::from_str::<Value>(body).ok().or_else(|| {
        let cleaned = body
            .replace("\\n", " ")
            .replace('\n', " ")
            .replace("\\\"", "\"");
        serde_json::from_str::<Value>(&cleaned).ok()
    })?;
    match parsed {
        // Double-encoded JSON
        Value::String(inner) => parse_argument_text(&inner),
        Value::Object(map) => Some(unwrap_single_json_field(map)),
        Value::Null => Some(Value::Object(Map::new())),
        other => Some(other),
    }
}

fn unwrap_single_json_field(map: Map<String, Value>) -> Value {
    if map.len() == 1 {
        if let Some(Value::String(text)) = map.values().next() {
            let trimmed = strip_code_fences(text);
            if trimmed.starts_with('{') {
                if let Some(Value::Object(inner)) = parse_argument_text(trimmed) {
                    return Value::Object(inner);
                }
            }
        }
    }
    Value::Object(map)
}

/// True for arguments that carry nothing (`{}`, `null`, blank text)
pub fn is_empty_arguments(params: &Value) -> bool {
    match normalize_arguments(params.clone()) {
        Value::Object(map) => map.values().all(|v| match v {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }),
        _ => false,
    }
}
