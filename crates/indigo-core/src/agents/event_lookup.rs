//! Event Lookup: finds the events a request refers to.
//!
//! `query` asks the model for a `list_events` call, the tool node runs it,
//! and `select` narrows the listing down to the referenced events.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::AgentServices;
use crate::ai::generator::Structured;
use crate::ai::schema::{FieldType, Schema};
use crate::ai::types::{Message, ToolChoice};
use crate::graph::{
    Agent, GraphError, Node, SharedState, StateUpdate, StepSink, Successor, ToolNode, TOOL_NODE,
};
use crate::tools::implementations::{GET_EVENT, LIST_EVENTS};

pub const NAME: &str = "event_lookup";

/// Tool name carried by the synthetic selection message
pub const SELECTION_TOOL_NAME: &str = "event_lookup";

pub const NO_MATCHES: &str = "No matching events found: []";

pub fn event_lookup(services: &AgentServices) -> Result<Agent, GraphError> {
    let tool_node = ToolNode::new(
        services.tools.clone(),
        services.tool_context.clone(),
        &[LIST_EVENTS],
    );
    Agent::builder(NAME)
        .node("query", Arc::new(QueryNode(services.clone())), Successor::Next(TOOL_NODE))
        .node(TOOL_NODE, Arc::new(tool_node), Successor::Next("select"))
        .node("select", Arc::new(SelectNode::new(services.clone())), Successor::End)
        .start(Successor::Next("query"))
        .max_steps(services.settings.max_steps)
        .build()
}

struct QueryNode(AgentServices);

#[async_trait]
impl Node for QueryNode {
    async fn run(&self, state: &SharedState, _sink: &StepSink) -> StateUpdate {
        let services = &self.0;
        let message = services
            .tool_turn(
                NAME,
                &query_instructions(services),
                &state.messages,
                &[LIST_EVENTS],
                ToolChoice::Tool(LIST_EVENTS.to_string()),
            )
            .await;
        StateUpdate::message(message)
    }
}

/// Events returned by the listing that just ran, plus any listing errors
#[derive(Debug, Default)]
struct Candidates {
    ids: Vec<String>,
    errors: Vec<String>,
}

impl Candidates {
    /// Read the `list_events` envelopes of the last message, if it is
    /// their (possibly collapsed) tool result.
    fn from_state(state: &SharedState) -> Self {
        let mut candidates = Candidates::default();
        let Some(message) = state.last_message() else {
            return candidates;
        };
        if !message.is_tool_result() || !message.tool_names().contains(&LIST_EVENTS) {
            return candidates;
        }

        // Collapsed results are envelopes separated by blank lines
        for envelope in serde_json::Deserializer::from_str(&message.content).into_iter::<Value>() {
            let Ok(envelope) = envelope else {
                candidates.errors.push("unreadable event listing".to_string());
                break;
            };
            if envelope["ok"] != Value::Bool(true) {
                let reason = envelope
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("listing failed");
                candidates.errors.push(reason.to_string());
                continue;
            }
            let events = envelope["data"].as_array().cloned().unwrap_or_default();
            for event in events {
                if let Some(id) = event["id"].as_str() {
                    if !candidates.ids.iter().any(|known| known == id) {
                        candidates.ids.push(id.to_string());
                    }
                }
            }
        }
        candidates
    }
}

struct SelectNode {
    services: AgentServices,
    schema: Schema,
}

impl SelectNode {
    fn new(services: AgentServices) -> Self {
        Self {
            services,
            schema: Schema::new(
                "EventSelection",
                "Ids of the listed events the user is referring to",
            )
            // Omitted means nothing selected
            .optional_field(
                "event_ids",
                FieldType::StringArray,
                "Ids copied exactly from the listing; empty unless the reference is unambiguous",
            ),
        }
    }

    async fn choose(&self, state: &SharedState, candidates: &[String]) -> Vec<String> {
        let generated = self
            .services
            .generator
            .generate_structured(
                &select_instructions(&self.services),
                &state.messages,
                &self.schema,
            )
            .await;
        let chosen = match generated {
            Ok(Structured::Record(record)) => record.string_array("event_ids"),
            Ok(Structured::Malformed { .. }) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Event selection failed; selecting nothing");
                Vec::new()
            }
        };

        let allowed: HashSet<&str> = candidates.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let kept: Vec<String> = chosen
            .into_iter()
            .filter(|id| allowed.contains(id.as_str()))
            .filter(|id| seen.insert(id.clone()))
            .collect();
        info!(candidates = candidates.len(), selected = kept.len(), "Events selected");
        kept
    }

    async fn fetch(&self, id: &str) -> Value {
        let services = &self.services;
        let result = services
            .tools
            .execute(GET_EVENT, json!({ "eventId": id }), &services.tool_context)
            .await;
        match result.as_ref().and_then(|r| r.data()) {
            Some(event) => event,
            None => {
                let error = result
                    .and_then(|r| serde_json::from_str::<Value>(&r.output).ok())
                    .map(|envelope| envelope["error"].clone())
                    .unwrap_or_else(|| {
                        json!({"code": "unknown_tool", "message": "get_event unavailable"})
                    });
                json!({ "id": id, "error": error })
            }
        }
    }
}

#[async_trait]
impl Node for SelectNode {
    async fn run(&self, state: &SharedState, _sink: &StepSink) -> StateUpdate {
        let candidates = Candidates::from_state(state);

        let content = if candidates.ids.is_empty() && !candidates.errors.is_empty() {
            format!("Could not list events: {}", candidates.errors.join("; "))
        } else if candidates.ids.is_empty() {
            NO_MATCHES.to_string()
        } else {
            let selected = self.choose(state, &candidates.ids).await;
            if selected.is_empty() {
                NO_MATCHES.to_string()
            } else {
                let mut events = Vec::with_capacity(selected.len());
                for id in &selected {
                    events.push(self.fetch(id).await);
                }
                format!("Selected events: {}", Value::Array(events))
            }
        };

        StateUpdate::message(Message::tool_result(
            format!("lookup_{}", Uuid::new_v4().simple()),
            SELECTION_TOOL_NAME,
            content,
        ))
    }
}

fn query_instructions(services: &AgentServices) -> String {
    format!(
        "You look up calendar events for Indigo, a time management assistant.\n\
         Call list_events once with query parameters that will surface the event or \
         events the latest request refers to. Supported parameters:\n\
         - timeMin: RFC 3339 lower bound (exclusive) on an event's end. Use the current time \
           unless the request points elsewhere.\n\
         - timeMax: RFC 3339 upper bound (exclusive) on an event's start. Must be after timeMin.\n\
         - maxResults: integer up to 2500.\n\
         - singleEvents: true expands recurring events into their instances; false returns \
           each recurring series once.\n\
         - orderBy: \"startTime\", only together with singleEvents=true.\n\
         - timeZone: always include it; the user's is {tz}.\n\
         - showDeleted, updatedMin: rarely needed.\n\
         Examples:\n\
         - \"edit my next event\": a single instance. Set timeMin to now, maxResults to 1, \
           singleEvents=true and orderBy=startTime.\n\
         - \"move my meeting on Friday afternoon\": a single instance. Set timeMin to 12:00 \
           and timeMax to 18:00 that Friday, singleEvents=true and orderBy=startTime.\n\
         - \"move my weekly standup\" or any ambiguous or recurring reference: use a wide \
           window of several weeks with singleEvents=false and no orderBy, so the series \
           itself is listed rather than one of its instances.\n\
         When unsure keep the window broad so the right event is in it. Assume referenced \
         events are upcoming. Do not use q for search terms.\n\
         Right now it is {now}.",
        tz = services.clock.timezone().name(),
        now = services.clock.describe()
    )
}

fn select_instructions(services: &AgentServices) -> String {
    format!(
        "You select calendar events for Indigo, a time management assistant.\n\
         The last tool result lists candidate events. Return in event_ids the ids of the \
         candidates the user's request refers to, copied exactly. Be strict: most requests \
         match none of the candidates, and then event_ids must be empty. If the user \
         mentions an English essay and only a Math class is listed, return nothing.\n\
         Right now it is {}.",
        services.clock.describe()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::InMemoryCalendar;
    use crate::testing::{services, timed_event, Reply, ScriptedGenerator};

    fn calendar() -> Arc<InMemoryCalendar> {
        Arc::new(InMemoryCalendar::with_events(
            chrono_tz::America::New_York,
            vec![
                timed_event("Math study", "2024-10-18T09:00:00", "2024-10-18T10:00:00"),
                timed_event("Dentist", "2024-10-18T15:00:00", "2024-10-18T16:00:00"),
            ],
        ))
    }

    fn listing_call() -> Reply {
        Reply::tool(
            "list_events",
            json!({
                "timeMin": "2024-10-17T14:00:00-04:00",
                "singleEvents": true,
                "orderBy": "startTime"
            }),
        )
    }

    #[tokio::test]
    async fn test_query_covers_single_and_recurring_references() {
        let generator = ScriptedGenerator::new(Vec::new());
        let services = services(generator, calendar()).await;
        let instructions = query_instructions(&services);

        assert!(!instructions.contains("always true"));
        assert!(instructions.contains("maxResults to 1, singleEvents=true and orderBy=startTime"));
        assert!(instructions.contains("wide window"));
        assert!(instructions.contains("singleEvents=false and no orderBy"));
        assert!(instructions.contains("America/New_York"));
    }

    #[tokio::test]
    async fn test_select_fetches_chosen_candidates() {
        let generator = ScriptedGenerator::new(vec![
            listing_call(),
            Reply::Json(json!({"event_ids": ["evt0001", "made-up", "evt0001"]})),
        ]);
        let services = services(generator.clone(), calendar()).await;
        let state = event_lookup(&services)
            .unwrap()
            .invoke(SharedState::with_user_message("Reschedule my Math study time"))
            .await;

        let selection = state.last_message().unwrap();
        assert_eq!(selection.name.as_deref(), Some(SELECTION_TOOL_NAME));
        assert!(selection.tool_call_id.as_deref().unwrap().starts_with("lookup_"));
        let body: Value = serde_json::from_str(
            selection.content.strip_prefix("Selected events: ").unwrap(),
        )
        .unwrap();
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["summary"], "Math study");

        let requests = generator.requests();
        assert_eq!(
            requests[0].choice,
            Some(ToolChoice::Tool("list_events".into()))
        );
        assert_eq!(requests[1].kind, "json");
    }

    #[tokio::test]
    async fn test_unlisted_ids_are_never_selected() {
        let generator = ScriptedGenerator::new(vec![
            listing_call(),
            Reply::Json(json!({"event_ids": ["english-essay"]})),
        ]);
        let services = services(generator, calendar()).await;
        let state = event_lookup(&services)
            .unwrap()
            .invoke(SharedState::with_user_message("Move my English essay"))
            .await;
        assert_eq!(state.last_message().unwrap().content, NO_MATCHES);
    }

    #[tokio::test]
    async fn test_omitted_selection_means_no_matches() {
        let generator = ScriptedGenerator::new(vec![listing_call(), Reply::Json(json!({}))]);
        let services = services(generator.clone(), calendar()).await;
        let state = event_lookup(&services)
            .unwrap()
            .invoke(SharedState::with_user_message("Move my thing"))
            .await;
        assert_eq!(state.last_message().unwrap().content, NO_MATCHES);
        assert_eq!(generator.remaining(), 0);
    }

    #[tokio::test]
    async fn test_empty_listing_skips_selection_model() {
        let generator = ScriptedGenerator::new(vec![Reply::tool(
            "list_events",
            json!({"timeMin": "2024-10-20T00:00:00", "timeMax": "2024-10-21T00:00:00"}),
        )]);
        let services = services(generator.clone(), calendar()).await;
        let state = event_lookup(&services)
            .unwrap()
            .invoke(SharedState::with_user_message("What's on Sunday?"))
            .await;
        assert_eq!(state.last_message().unwrap().content, NO_MATCHES);
        assert_eq!(generator.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_listing_error_is_reported() {
        let generator = ScriptedGenerator::new(vec![Reply::tool(
            "list_events",
            json!({"timeMin": "2024-10-21T00:00:00", "timeMax": "2024-10-20T00:00:00"}),
        )]);
        let services = services(generator, calendar()).await;
        let state = event_lookup(&services)
            .unwrap()
            .invoke(SharedState::with_user_message("Anything?"))
            .await;
        assert!(state
            .last_message()
            .unwrap()
            .content
            .starts_with("Could not list events: timeMin must be before timeMax"));
    }

    #[test]
    fn test_candidates_read_collapsed_listings() {
        let mut state = SharedState::default();
        state.apply(StateUpdate::messages(vec![
            Message::tool_result(
                "c1",
                "list_events",
                r#"{"ok":true,"data":[{"id":"a"},{"id":"b"}]}"#,
            ),
            Message::tool_result(
                "c2",
                "list_events",
                r#"{"ok":true,"data":[{"id":"b"},{"id":"c"}]}"#,
            ),
        ]));
        let candidates = Candidates::from_state(&state);
        assert_eq!(candidates.ids, vec!["a", "b", "c"]);
        assert!(candidates.errors.is_empty());
    }
}
