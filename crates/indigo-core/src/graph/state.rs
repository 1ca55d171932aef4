//! Conversation state shared by every node of a thread

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ai::types::Message;

/// Which agent the router hands the turn to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HelperAgent {
    EventInitializer,
    EventLookup,
    EventEditor,
    Indigo,
    None,
}

impl HelperAgent {
    /// Wire names, in the order offered to the router model
    pub const NAMES: &'static [&'static str] = &[
        "event_initializer",
        "event_lookup",
        "event_editor",
        "indigo",
        "none",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HelperAgent::EventInitializer => "event_initializer",
            HelperAgent::EventLookup => "event_lookup",
            HelperAgent::EventEditor => "event_editor",
            HelperAgent::Indigo => "indigo",
            HelperAgent::None => "none",
        }
    }
}

impl fmt::Display for HelperAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HelperAgent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "event_initializer" => Ok(HelperAgent::EventInitializer),
            "event_lookup" => Ok(HelperAgent::EventLookup),
            "event_editor" => Ok(HelperAgent::EventEditor),
            "indigo" => Ok(HelperAgent::Indigo),
            "none" | "" => Ok(HelperAgent::None),
            other => Err(format!("unknown helper agent: {other}")),
        }
    }
}

/// State of one conversation thread.
///
/// `messages` only ever grows; `helper_agent` and `context` are overwritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SharedState {
    pub messages: Vec<Message>,
    pub helper_agent: Option<HelperAgent>,
    pub context: String,
}

impl SharedState {
    pub fn with_user_message(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(content)],
            ..Default::default()
        }
    }

    /// Merge a node's update into the state
    pub fn apply(&mut self, update: StateUpdate) {
        let batch = if update.preserve_batches {
            update.messages
        } else {
            collapse_tool_results(update.messages)
        };
        self.messages.extend(batch);
        if let Some(helper) = update.helper_agent {
            self.helper_agent = Some(helper);
        }
        if let Some(context) = update.context {
            self.context = context;
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Partial state returned by a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub helper_agent: Option<HelperAgent>,
    pub context: Option<String>,
    /// Append `messages` as-is. Set for updates coming out of a nested
    /// agent, whose batches were already collapsed when it ran.
    pub preserve_batches: bool,
}

impl StateUpdate {
    pub fn message(message: Message) -> Self {
        Self::messages(vec![message])
    }

    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn context(context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
            ..Default::default()
        }
    }

    pub fn with_helper(mut self, helper: HelperAgent) -> Self {
        self.helper_agent = Some(helper);
        self
    }

    /// Content of the newest message in this update, or `""`
    pub fn latest_content(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// Fold every tool result of a batch into the first one.
///
/// Contents are joined with a blank line, names and call ids with `,`.
/// Other messages keep their relative order.
pub fn collapse_tool_results(batch: Vec<Message>) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(batch.len());
    let mut first_result: Option<usize> = None;

    for message in batch {
        if !message.is_tool_result() {
            out.push(message);
            continue;
        }
        match first_result {
            None => {
                first_result = Some(out.len());
                out.push(message);
            }
            Some(index) => {
                let head = &mut out[index];
                head.content.push_str("\n\n");
                head.content.push_str(&message.content);
                head.name = join_list(head.name.take(), message.name);
                head.tool_call_id = join_list(head.tool_call_id.take(), message.tool_call_id);
            }
        }
    }
    out
}

fn join_list(head: Option<String>, next: Option<String>) -> Option<String> {
    match (head, next) {
        (Some(head), Some(next)) => Some(format!("{head},{next}")),
        (head, next) => head.or(next),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::{AiToolCall, Role};
    use serde_json::json;

    fn call(id: &str) -> AiToolCall {
        AiToolCall {
            id: id.into(),
            name: "delete_event".into(),
            arguments: json!({"eventId": id}),
        }
    }

    #[test]
    fn test_tool_results_collapse_in_order() {
        let mut state = SharedState::with_user_message("Cancel everything");
        state.apply(StateUpdate::messages(vec![
            Message::tool_result("c1", "delete_event", "one"),
            Message::assistant("between"),
            Message::tool_result("c2", "delete_event", "two"),
            Message::tool_result("c3", "get_event", "three"),
        ]));

        assert_eq!(state.messages.len(), 3);
        let merged = &state.messages[1];
        assert_eq!(merged.content, "one\n\ntwo\n\nthree");
        assert_eq!(merged.name.as_deref(), Some("delete_event,delete_event,get_event"));
        assert_eq!(merged.tool_call_id.as_deref(), Some("c1,c2,c3"));
        assert_eq!(state.messages[2].content, "between");
    }

    #[test]
    fn test_separate_batches_are_not_merged() {
        let mut state = SharedState::default();
        state.apply(StateUpdate::message(Message::assistant_with_tools(
            "",
            vec![call("c1")],
        )));
        state.apply(StateUpdate::message(Message::tool_result("c1", "delete_event", "a")));
        state.apply(StateUpdate::message(Message::tool_result("x", "event_lookup", "b")));
        assert_eq!(state.messages.len(), 3);
        assert_eq!(state.messages[0].role, Role::Assistant);
    }

    #[test]
    fn test_preserved_batches_skip_collapse() {
        let mut state = SharedState::default();
        state.apply(StateUpdate {
            messages: vec![
                Message::tool_result("c1", "list_events", "[]"),
                Message::tool_result("lookup_1", "event_lookup", "Selected events: []"),
            ],
            preserve_batches: true,
            ..Default::default()
        });
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn test_scalars_overwrite_only_when_set() {
        let mut state = SharedState::default();
        state.apply(StateUpdate::context("Busy 12:00-13:00"));
        state.apply(
            StateUpdate::message(Message::assistant("hi")).with_helper(HelperAgent::Indigo),
        );
        state.apply(StateUpdate::default());
        assert_eq!(state.context, "Busy 12:00-13:00");
        assert_eq!(state.helper_agent, Some(HelperAgent::Indigo));
    }

    #[test]
    fn test_helper_agent_names_parse() {
        for name in HelperAgent::NAMES {
            let parsed: HelperAgent = name.parse().unwrap();
            assert_eq!(parsed.as_str(), *name);
        }
        assert!("calendar_wizard".parse::<HelperAgent>().is_err());
        assert_eq!(
            serde_json::to_value(HelperAgent::EventEditor).unwrap(),
            json!("event_editor")
        );
    }
}
