//! Conversation and tool-calling types shared by agents and providers

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition handed to a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A tool invocation requested by a model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiToolCall {
    pub id: String,
    pub name: String,
    /// Parsed JSON when the provider sent valid JSON, otherwise the raw
    /// argument text as a string.
    pub arguments: Value,
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of the shared conversation history.
///
/// Tool results produced in the same batch are stored as a single message
/// whose `name` and `tool_call_id` hold comma-separated lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<AiToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            name: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<AiToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool
    }

    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }

    /// Individual call ids of a (possibly collapsed) tool result.
    pub fn tool_call_ids(&self) -> Vec<&str> {
        split_list(self.tool_call_id.as_deref())
    }

    /// Individual tool names of a (possibly collapsed) tool result.
    pub fn tool_names(&self) -> Vec<&str> {
        split_list(self.name.as_deref())
    }
}

fn split_list(joined: Option<&str>) -> Vec<&str> {
    joined
        .map(|s| s.split(',').map(str::trim).filter(|p| !p.is_empty()).collect())
        .unwrap_or_default()
}

/// How strongly a model is pushed toward calling tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// Model decides
    Auto,
    /// Model must call one of the offered tools
    Any,
    /// Model must call this tool
    Tool(String),
}

/// Result of a tool-capable generation
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    Text(String),
    ToolCalls {
        text: String,
        calls: Vec<AiToolCall>,
    },
}

impl Generation {
    pub fn into_message(self) -> Message {
        match self {
            Generation::Text(text) => Message::assistant(text),
            Generation::ToolCalls { text, calls } => Message::assistant_with_tools(text, calls),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collapsed_tool_result_lists() {
        let msg = Message::tool_result("call_1,call_2", "delete_event,delete_event", "done");
        assert!(msg.is_tool_result());
        assert_eq!(msg.tool_call_ids(), vec!["call_1", "call_2"]);
        assert_eq!(msg.tool_names(), vec!["delete_event", "delete_event"]);
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let value = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn test_generation_into_message() {
        let call = AiToolCall {
            id: "call_1".into(),
            name: "add_event".into(),
            arguments: json!({"summary": "Lunch"}),
        };
        let msg = Generation::ToolCalls {
            text: String::new(),
            calls: vec![call.clone()],
        }
        .into_message();
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls, vec![call]);

        let text = Generation::Text("hello".into()).into_message();
        assert!(!text.has_tool_calls());
        assert_eq!(text.content, "hello");
    }
}
