//! Contextualizer: turns the coming days of the calendar into a terse
//! busy-times report for the router.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::AgentServices;
use crate::ai::types::Message;
use crate::graph::{Agent, GraphError, Node, SharedState, StateUpdate, StepSink, Successor};
use crate::tools::implementations::LIST_EVENTS;
use crate::tools::ToolResult;

pub const NAME: &str = "contextualizer";

pub fn contextualizer(services: &AgentServices) -> Result<Agent, GraphError> {
    Agent::builder(NAME)
        .node("get", Arc::new(GetNode(services.clone())), Successor::Next("summarize"))
        .node("summarize", Arc::new(SummarizeNode(services.clone())), Successor::End)
        .start(Successor::Next("get"))
        .max_steps(services.settings.max_steps)
        .build()
}

/// Lists upcoming events straight from the tool layer; no model call
struct GetNode(AgentServices);

#[async_trait]
impl Node for GetNode {
    async fn run(&self, _state: &SharedState, _sink: &StepSink) -> StateUpdate {
        let services = &self.0;
        let clock = services.clock;
        let params = json!({
            "timeMin": clock.now().to_rfc3339(),
            "timeMax": clock.days_from_now(services.settings.context_days),
            "singleEvents": true,
            "orderBy": "startTime",
            "timeZone": clock.timezone().name(),
        });
        let result = services
            .tools
            .execute(LIST_EVENTS, params, &services.tool_context)
            .await
            .unwrap_or_else(|| {
                ToolResult::error_with_code("unknown_tool", format!("Unknown tool: {LIST_EVENTS}"))
            });
        if result.is_error {
            warn!("Contextualizer could not list events");
        }
        StateUpdate::context(result.output)
    }
}

struct SummarizeNode(AgentServices);

#[async_trait]
impl Node for SummarizeNode {
    async fn run(&self, state: &SharedState, _sink: &StepSink) -> StateUpdate {
        let services = &self.0;
        let days = services.settings.context_days;

        let listing = match serde_json::from_str::<Value>(&state.context) {
            Ok(envelope) if envelope["ok"] == Value::Bool(true) => envelope["data"].clone(),
            // Errors stay in the context verbatim
            _ => return StateUpdate::default(),
        };
        if listing.as_array().is_some_and(|events| events.is_empty()) {
            return StateUpdate::context(format!("No upcoming events in the next {days} days."));
        }

        let system = instructions(services, days);
        let history = [Message::user(listing.to_string())];
        match services.generator.generate(&system, &history).await {
            Ok(summary) if !summary.trim().is_empty() => {
                info!(chars = summary.len(), "Calendar context summarized");
                StateUpdate::context(summary.trim())
            }
            Ok(_) => {
                warn!("Empty calendar summary; keeping raw listing");
                StateUpdate::context(listing.to_string())
            }
            Err(e) => {
                warn!(error = %e, "Calendar summary failed; keeping raw listing");
                StateUpdate::context(listing.to_string())
            }
        }
    }
}

fn instructions(services: &AgentServices, days: i64) -> String {
    let tz = services.clock.timezone().name();
    format!(
        "You are the Contextualizer for Indigo, a time management assistant.\n\
         Turn the calendar events you are given into a short report that other \
         language models will read before scheduling anything. Balance detail \
         with brevity: every busy interval must be clear enough that nothing \
         gets double-booked.\n\
         Frame the report as busy times, and collapse repeating events into \
         recurrence notation. For example:\n\
         Busy times, next {days} days ({tz} timezone):\n\
         * 12:00-13:00, 2025-02-09 (i2i roundtable)\n\
         * 14:00-16:00, every Tuesday and Thursday starting 2025-02-11 (Office Hours)\n\
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
                timed_event("Roundtable", "2024-10-18T12:00:00", "2024-10-18T13:00:00"),
                timed_event("Old", "2024-10-01T12:00:00", "2024-10-01T13:00:00"),
                timed_event("Far away", "2024-11-30T12:00:00", "2024-11-30T13:00:00"),
            ],
        ))
    }

    #[tokio::test]
    async fn test_summary_replaces_context() {
        let generator = ScriptedGenerator::new(vec![Reply::text(
            "Busy times: 12:00-13:00, 2024-10-18 (Roundtable)",
        )]);
        let services = services(generator.clone(), calendar()).await;
        let agent = contextualizer(&services).unwrap();

        let state = agent.invoke(SharedState::with_user_message("hi")).await;
        assert_eq!(state.context, "Busy times: 12:00-13:00, 2024-10-18 (Roundtable)");
        assert_eq!(state.messages.len(), 1);

        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        let listing = &requests[0].history[0].content;
        assert!(listing.contains("Roundtable"));
        assert!(!listing.contains("Old"));
        assert!(!listing.contains("Far away"));
        assert!(requests[0].system.contains("next 10 days"));
    }

    #[tokio::test]
    async fn test_failed_summary_keeps_listing() {
        let generator = ScriptedGenerator::new(vec![Reply::Fail("overloaded".into())]);
        let services = services(generator, calendar()).await;
        let state = contextualizer(&services)
            .unwrap()
            .invoke(SharedState::default())
            .await;
        assert!(state.context.contains("Roundtable"));
    }

    #[tokio::test]
    async fn test_empty_calendar_skips_model() {
        let generator = ScriptedGenerator::new(vec![]);
        let empty = Arc::new(InMemoryCalendar::new(chrono_tz::America::New_York));
        let services = services(generator.clone(), empty).await;
        let state = contextualizer(&services)
            .unwrap()
            .invoke(SharedState::default())
            .await;
        assert_eq!(state.context, "No upcoming events in the next 10 days.");
        assert!(generator.requests().is_empty());
    }
}
