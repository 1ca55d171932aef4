//! Google Gemini generateContent format handler

use serde_json::{json, Map, Value};

use super::{
    answers_pending, orphan_result_text, shared_result_pointer, FormatHandler, RequestSpec,
    MISSING_RESULT,
};
use crate::ai::generator::GenerationError;
use crate::ai::types::{AiToolCall, Generation, Message, Role, ToolChoice};

/// Schema keywords Gemini's OpenAPI subset accepts.
const SCHEMA_KEYS: &[&str] = &[
    "type",
    "format",
    "description",
    "nullable",
    "enum",
    "properties",
    "required",
    "items",
    "minItems",
    "maxItems",
];

pub struct GoogleFormat;

impl GoogleFormat {
    pub fn convert_contents(&self, history: &[Message]) -> Vec<Value> {
        let mut contents: Vec<Value> = Vec::new();
        // (id, name) of calls the last model turn is waiting on
        let mut pending: Vec<(String, String)> = Vec::new();

        for msg in history {
            let pending_ids: Vec<String> = pending.iter().map(|(id, _)| id.clone()).collect();
            if msg.role == Role::Tool && answers_pending(msg, &pending_ids) {
                let ids = msg.tool_call_ids();
                let names = msg.tool_names();
                let first = ids[0];
                let parts: Vec<Value> = ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| {
                        let name = names
                            .get(i)
                            .map(|n| n.to_string())
                            .or_else(|| {
                                pending
                                    .iter()
                                    .find(|(pid, _)| pid == id)
                                    .map(|(_, n)| n.clone())
                            })
                            .unwrap_or_default();
                        let content = if i == 0 {
                            msg.content.clone()
                        } else {
                            shared_result_pointer(first)
                        };
                        json!({
                            "functionResponse": {"name": name, "response": {"content": content}}
                        })
                    })
                    .collect();
                push_turn(&mut contents, "user", parts);
                pending.retain(|(pid, _)| !ids.contains(&pid.as_str()));
                continue;
            }

            flush_unanswered(&mut contents, &mut pending);

            match msg.role {
                Role::User | Role::System => {
                    push_turn(&mut contents, "user", text_part(&msg.content))
                }
                Role::Tool => push_turn(&mut contents, "user", text_part(&orphan_result_text(msg))),
                Role::Assistant => {
                    let mut parts = text_part(&msg.content);
                    for call in &msg.tool_calls {
                        parts.push(json!({
                            "functionCall": {"name": call.name, "args": call_args(call)}
                        }));
                        pending.push((call.id.clone(), call.name.clone()));
                    }
                    push_turn(&mut contents, "model", parts);
                }
            }
        }
        flush_unanswered(&mut contents, &mut pending);
        contents
    }

    pub fn tool_config(&self, choice: &ToolChoice) -> Value {
        match choice {
            ToolChoice::Auto => json!({"functionCallingConfig": {"mode": "AUTO"}}),
            ToolChoice::Any => json!({"functionCallingConfig": {"mode": "ANY"}}),
            ToolChoice::Tool(name) => json!({
                "functionCallingConfig": {"mode": "ANY", "allowedFunctionNames": [name]}
            }),
        }
    }
}

fn text_part(text: &str) -> Vec<Value> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![json!({"text": text})]
    }
}

fn call_args(call: &AiToolCall) -> Value {
    match &call.arguments {
        Value::Object(_) => call.arguments.clone(),
        Value::String(raw) => json!({"input": raw}),
        _ => json!({}),
    }
}

/// Gemini rejects consecutive turns from the same role, so adjacent turns
/// are merged.
fn push_turn(contents: &mut Vec<Value>, role: &str, parts: Vec<Value>) {
    if parts.is_empty() {
        return;
    }
    if let Some(last) = contents.last_mut() {
        if last["role"] == role {
            if let Some(existing) = last["parts"].as_array_mut() {
                existing.extend(parts);
                return;
            }
        }
    }
    contents.push(json!({"role": role, "parts": parts}));
}

fn flush_unanswered(contents: &mut Vec<Value>, pending: &mut Vec<(String, String)>) {
    let parts: Vec<Value> = pending
        .drain(..)
        .map(|(_, name)| {
            json!({"functionResponse": {"name": name, "response": {"content": MISSING_RESULT}}})
        })
        .collect();
    push_turn(contents, "user", parts);
}

/// Strip JSON Schema keywords Gemini does not understand.
pub fn sanitize_schema(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };
    let mut out = Map::new();
    for (key, value) in map {
        if !SCHEMA_KEYS.contains(&key.as_str()) {
            continue;
        }
        let cleaned = match key.as_str() {
            "properties" => match value {
                Value::Object(props) => Value::Object(
                    props
                        .iter()
                        .map(|(k, v)| (k.clone(), sanitize_schema(v)))
                        .collect(),
                ),
                other => other.clone(),
            },
            "items" => sanitize_schema(value),
            _ => value.clone(),
        };
        out.insert(key.clone(), cleaned);
    }
    Value::Object(out)
}

impl FormatHandler for GoogleFormat {
    fn build_body(&self, spec: &RequestSpec<'_>) -> Value {
        let mut generation_config = json!({
            "maxOutputTokens": spec.max_tokens,
            "temperature": spec.temperature,
        });
        if let Some(schema) = spec.schema {
            generation_config["responseMimeType"] = json!("application/json");
            generation_config["responseSchema"] = sanitize_schema(&schema.to_json_schema());
        }

        let mut body = json!({
            "contents": self.convert_contents(spec.history),
            "systemInstruction": {"parts": [{"text": spec.system}]},
            "generationConfig": generation_config,
        });

        if !spec.tools.is_empty() {
            let declarations: Vec<Value> = spec
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": sanitize_schema(&t.input_schema)
                    })
                })
                .collect();
            body["tools"] = json!([{"functionDeclarations": declarations}]);
            if let Some(choice) = spec.tool_choice {
                body["toolConfig"] = self.tool_config(choice);
            }
        }
        body
    }

    fn parse_response(&self, json: &Value) -> Result<Generation, GenerationError> {
        let candidate = json
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .ok_or_else(|| {
                let reason = json
                    .pointer("/promptFeedback/blockReason")
                    .and_then(|r| r.as_str())
                    .unwrap_or("no candidates in response");
                GenerationError::Response(reason.to_string())
            })?;

        let mut text = String::new();
        let mut calls = Vec::new();
        let parts = candidate
            .pointer("/content/parts")
            .and_then(|p| p.as_array())
            .cloned()
            .unwrap_or_default();
        for part in parts {
            if let Some(chunk) = part.get("text").and_then(|t| t.as_str()) {
                text.push_str(chunk);
            }
            if let Some(call) = part.get("functionCall") {
                let name = call.get("name").and_then(|n| n.as_str()).unwrap_or("");
                calls.push(AiToolCall {
                    // Gemini does not assign call ids.
                    id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                    name: name.to_string(),
                    arguments: call.get("args").cloned().unwrap_or_else(|| json!({})),
                });
            }
        }

        let text = text.trim().to_string();
        if calls.is_empty() {
            Ok(Generation::Text(text))
        } else {
            Ok(Generation::ToolCalls { text, calls })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapsed_result_becomes_function_responses() {
        let calls = vec![
            AiToolCall {
                id: "c1".into(),
                name: "delete_event".into(),
                arguments: json!({"eventId": "a"}),
            },
            AiToolCall {
                id: "c2".into(),
                name: "delete_event".into(),
                arguments: json!({"eventId": "b"}),
            },
        ];
        let history = vec![
            Message::user("cancel"),
            Message::assistant_with_tools("", calls),
            Message::tool_result("c1,c2", "delete_event,delete_event", "ok\n\nok"),
            Message::assistant("Both cancelled."),
        ];

        let contents = GoogleFormat.convert_contents(&history);
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["args"]["eventId"], "a");
        let responses = contents[2]["parts"].as_array().unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["functionResponse"]["response"]["content"], "ok\n\nok");
        assert_eq!(responses[1]["functionResponse"]["name"], "delete_event");
    }

    #[test]
    fn test_orphan_result_merges_into_user_turn() {
        let history = vec![
            Message::user("find lunch"),
            Message::tool_result("lookup_1", "event_lookup", "[]"),
        ];
        let contents = GoogleFormat.convert_contents(&history);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["parts"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_sanitize_schema_drops_unsupported_keys() {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "ids": {"type": "array", "items": {"type": "string", "default": "x"}}
            }
        });
        let cleaned = sanitize_schema(&schema);
        assert!(cleaned.get("additionalProperties").is_none());
        assert!(cleaned["properties"]["ids"]["items"].get("default").is_none());
        assert_eq!(cleaned["properties"]["ids"]["type"], "array");
    }

    #[test]
    fn test_parse_function_calls() {
        let response = json!({
            "candidates": [{
                "content": {"parts": [
                    {"functionCall": {"name": "list_events", "args": {"maxResults": 5}}}
                ]}
            }]
        });
        let Generation::ToolCalls { calls, .. } = GoogleFormat.parse_response(&response).unwrap()
        else {
            panic!("expected tool calls");
        };
        assert_eq!(calls[0].name, "list_events");
        assert!(calls[0].id.starts_with("call_"));
    }

    #[test]
    fn test_blocked_prompt_is_an_error() {
        let response = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = GoogleFormat.parse_response(&response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_forced_tool_config() {
        let config = GoogleFormat.tool_config(&ToolChoice::Tool("list_events".into()));
        assert_eq!(config["functionCallingConfig"]["mode"], "ANY");
        assert_eq!(
            config["functionCallingConfig"]["allowedFunctionNames"][0],
            "list_events"
        );
    }
}
