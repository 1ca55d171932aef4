//! OpenAI chat/completions format handler

use serde_json::{json, Value};

use super::{
    answers_pending, orphan_result_text, shared_result_pointer, FormatHandler, RequestSpec,
    MISSING_RESULT,
};
use crate::ai::generator::GenerationError;
use crate::ai::types::{AiTool, AiToolCall, Generation, Message, Role, ToolChoice};

pub struct OpenAIFormat;

impl OpenAIFormat {
    /// Convert history to chat/completions messages.
    ///
    /// Every assistant `tool_calls` entry must be answered by `tool` messages
    /// before the next turn, so collapsed results are split back per id and
    /// unanswered calls get a placeholder.
    pub fn convert_messages(&self, system: &str, history: &[Message]) -> Vec<Value> {
        let mut result = vec![json!({"role": "system", "content": system})];
        let mut pending: Vec<String> = Vec::new();

        for msg in history {
            if msg.role == Role::Tool && answers_pending(msg, &pending) {
                let ids = msg.tool_call_ids();
                let first = ids[0];
                for (i, id) in ids.iter().enumerate() {
                    let content = if i == 0 {
                        msg.content.clone()
                    } else {
                        shared_result_pointer(first)
                    };
                    result.push(json!({
                        "role": "tool",
                        "tool_call_id": id,
                        "content": content
                    }));
                }
                pending.retain(|p| !ids.contains(&p.as_str()));
                continue;
            }

            flush_unanswered(&mut result, &mut pending);

            match msg.role {
                Role::System => result.push(json!({"role": "system", "content": msg.content})),
                Role::User => result.push(json!({"role": "user", "content": msg.content})),
                Role::Tool => {
                    result.push(json!({"role": "user", "content": orphan_result_text(msg)}))
                }
                Role::Assistant if msg.has_tool_calls() => {
                    let tool_calls: Vec<Value> = msg.tool_calls.iter().map(encode_call).collect();
                    let content = if msg.content.is_empty() {
                        Value::Null
                    } else {
                        Value::String(msg.content.clone())
                    };
                    result.push(json!({
                        "role": "assistant",
                        "content": content,
                        "tool_calls": tool_calls
                    }));
                    pending = msg.tool_calls.iter().map(|c| c.id.clone()).collect();
                }
                Role::Assistant => {
                    result.push(json!({"role": "assistant", "content": msg.content}))
                }
            }
        }
        flush_unanswered(&mut result, &mut pending);
        result
    }

    pub fn convert_tools(&self, tools: &[AiTool]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema
                    }
                })
            })
            .collect()
    }

    pub fn tool_choice(&self, choice: &ToolChoice) -> Value {
        match choice {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::Any => json!("required"),
            ToolChoice::Tool(name) => json!({"type": "function", "function": {"name": name}}),
        }
    }
}

fn encode_call(call: &AiToolCall) -> Value {
    let arguments = match &call.arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    };
    json!({
        "id": call.id,
        "type": "function",
        "function": {"name": call.name, "arguments": arguments}
    })
}

fn flush_unanswered(result: &mut Vec<Value>, pending: &mut Vec<String>) {
    for id in pending.drain(..) {
        result.push(json!({"role": "tool", "tool_call_id": id, "content": MISSING_RESULT}));
    }
}

impl FormatHandler for OpenAIFormat {
    fn build_body(&self, spec: &RequestSpec<'_>) -> Value {
        let mut body = json!({
            "model": spec.model,
            "max_tokens": spec.max_tokens,
            "temperature": spec.temperature,
            "messages": self.convert_messages(spec.system, spec.history),
        });

        if !spec.tools.is_empty() {
            body["tools"] = json!(self.convert_tools(spec.tools));
            if let Some(choice) = spec.tool_choice {
                body["tool_choice"] = self.tool_choice(choice);
            }
        }

        if let Some(schema) = spec.schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.to_json_schema(),
                    "strict": false
                }
            });
        }
        body
    }

    fn parse_response(&self, json: &Value) -> Result<Generation, GenerationError> {
        let message = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| GenerationError::Response("no choices in response".into()))?;

        let text = message
            .get("content")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_string();

        let calls: Vec<AiToolCall> = message
            .get("tool_calls")
            .and_then(|c| c.as_array())
            .map(|arr| arr.iter().filter_map(decode_call).collect())
            .unwrap_or_default();

        if calls.is_empty() {
            Ok(Generation::Text(text))
        } else {
            Ok(Generation::ToolCalls { text, calls })
        }
    }
}

fn decode_call(call: &Value) -> Option<AiToolCall> {
    let id = call.get("id").and_then(|i| i.as_str())?;
    let function = call.get("function")?;
    let name = function.get("name").and_then(|n| n.as_str())?;
    let raw = function
        .get("arguments")
        .and_then(|a| a.as_str())
        .unwrap_or("{}");
    // Keep unparsable argument text so the tool layer can try to repair it.
    let arguments =
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Some(AiToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, name: &str) -> AiToolCall {
        AiToolCall {
            id: id.into(),
            name: name.into(),
            arguments: json!({"eventId": id}),
        }
    }

    #[test]
    fn test_collapsed_result_is_split_per_call() {
        let history = vec![
            Message::user("cancel both"),
            Message::assistant_with_tools(
                "",
                vec![call("c1", "delete_event"), call("c2", "delete_event")],
            ),
            Message::tool_result("c1,c2", "delete_event,delete_event", "first\n\nsecond"),
        ];

        let messages = OpenAIFormat.convert_messages("sys", &history);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["content"], Value::Null);
        assert_eq!(messages[2]["tool_calls"][1]["id"], "c2");
        assert_eq!(messages[3]["tool_call_id"], "c1");
        assert_eq!(messages[3]["content"], "first\n\nsecond");
        assert_eq!(messages[4]["tool_call_id"], "c2");
        assert!(messages[4]["content"]
            .as_str()
            .unwrap()
            .contains("c1"));
    }

    #[test]
    fn test_orphan_result_becomes_user_text() {
        let history = vec![
            Message::user("find lunch"),
            Message::tool_result("lookup_1", "event_lookup", "[]"),
        ];
        let messages = OpenAIFormat.convert_messages("sys", &history);
        assert_eq!(messages[2]["role"], "user");
        assert!(messages[2]["content"]
            .as_str()
            .unwrap()
            .starts_with("[Tool result: event_lookup]"));
    }

    #[test]
    fn test_unanswered_calls_get_placeholder() {
        let history = vec![
            Message::assistant_with_tools("", vec![call("c1", "add_event")]),
            Message::assistant("done"),
        ];
        let messages = OpenAIFormat.convert_messages("sys", &history);
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["content"], MISSING_RESULT);
        assert_eq!(messages[3]["content"], "done");
    }

    #[test]
    fn test_tool_choice_encoding() {
        assert_eq!(OpenAIFormat.tool_choice(&ToolChoice::Any), json!("required"));
        assert_eq!(
            OpenAIFormat.tool_choice(&ToolChoice::Tool("list_events".into()))["function"]["name"],
            "list_events"
        );
    }

    #[test]
    fn test_parse_tool_calls_keeps_raw_arguments() {
        let response = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function",
                         "function": {"name": "add_event", "arguments": "{\"summary\":\"Lunch\"}"}},
                        {"id": "b", "type": "function",
                         "function": {"name": "add_event", "arguments": "```json\n{}\n```"}}
                    ]
                }
            }]
        });
        let Generation::ToolCalls { text, calls } =
            OpenAIFormat.parse_response(&response).unwrap()
        else {
            panic!("expected tool calls");
        };
        assert!(text.is_empty());
        assert_eq!(calls[0].arguments["summary"], "Lunch");
        assert_eq!(calls[1].arguments, json!("```json\n{}\n```"));
    }

    #[test]
    fn test_parse_text_and_missing_choices() {
        let response = json!({"choices": [{"message": {"content": " hi "}}]});
        assert_eq!(
            OpenAIFormat.parse_response(&response).unwrap(),
            Generation::Text("hi".into())
        );
        assert!(OpenAIFormat.parse_response(&json!({})).is_err());
    }
}
