//! Indigo: the router that talks to the user and delegates to specialists

use async_trait::async_trait;
use tracing::{info, warn};

use super::AgentServices;
use crate::ai::generator::Structured;
use crate::ai::schema::{FieldType, Schema};
use crate::ai::types::Message;
use crate::graph::{HelperAgent, Node, SharedState, StateUpdate, StepSink};

fn output_schema() -> Schema {
    Schema::new(
        "IndigoOutput",
        "Indigo's reply to the user and the helper agent to run next",
    )
    .field(
        "message",
        FieldType::String,
        "Message shown to the user",
    )
    .field(
        "helper_agent",
        FieldType::Enum(HelperAgent::NAMES),
        "Helper agent to delegate to, or none to hand the turn back to the user",
    )
}

/// Single-node router. Only the structured `helper_agent` field decides
/// delegation.
pub struct IndigoNode {
    services: AgentServices,
    schema: Schema,
}

impl IndigoNode {
    pub fn new(services: AgentServices) -> Self {
        Self {
            services,
            schema: output_schema(),
        }
    }

    fn instructions(&self, context: &str) -> String {
        let context = if context.is_empty() {
            String::new()
        } else {
            format!("\nContext from the user's calendar:\n{context}\n")
        };
        format!(
            "You are Indigo, the assistant of a time management platform. Help the user \
             take charge of their time in a way tailored to them, and be as helpful as \
             you can even with requests unrelated to scheduling. Keep replies warm, \
             energetic and broken into short paragraphs.\n\
             \n\
             You cannot touch the calendar yourself. Helper agents can:\n\
             - event_initializer: for requests to create new events\n\
             - event_lookup: for read-only questions about existing events, and only \
               when the calendar context below does not already answer them\n\
             - event_editor: for requests to update or delete existing events\n\
             Set helper_agent to the one helper that should act next and tell the user \
             what is happening in message. When a helper has reported back, summarize \
             its result for the user. Use indigo to think again before answering. Use \
             none when no calendar change or lookup is needed, including when you ask \
             the user a clarifying follow-up question, and once the user has their \
             answer and nothing is left to do.\n\
             Never claim an event was created, changed or found unless a helper's result \
             in the conversation says so.\n\
             {context}\n\
             Right now it is {}.",
            self.services.clock.describe()
        )
    }
}

#[async_trait]
impl Node for IndigoNode {
    async fn run(&self, state: &SharedState, _sink: &StepSink) -> StateUpdate {
        let system = self.instructions(&state.context);
        let generated = self
            .services
            .generator
            .generate_structured(&system, &state.messages, &self.schema)
            .await;

        match generated {
            Ok(Structured::Record(record)) => {
                let helper = record
                    .str("helper_agent")
                    .and_then(|name| name.parse::<HelperAgent>().ok())
                    .unwrap_or(HelperAgent::None);
                let message = record.str("message").unwrap_or_default().trim();
                info!(helper = %helper, "Indigo routed turn");
                let messages = if message.is_empty() {
                    Vec::new()
                } else {
                    vec![Message::assistant(message)]
                };
                StateUpdate::messages(messages).with_helper(helper)
            }
            Ok(Structured::Malformed { raw, .. }) => {
                StateUpdate::message(Message::assistant(raw)).with_helper(HelperAgent::None)
            }
            Err(e) => {
                warn!(error = %e, "Indigo generation failed");
                StateUpdate::message(Message::assistant(format!(
                    "Sorry, I ran into a problem and couldn't finish that request ({e}). Please try again in a moment."
                )))
                .with_helper(HelperAgent::None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::InMemoryCalendar;
    use crate::testing::{services, Reply, ScriptedGenerator};
    use serde_json::json;
    use std::sync::Arc;

    async fn run(reply: Reply, state: SharedState) -> (StateUpdate, Arc<ScriptedGenerator>) {
        let generator = ScriptedGenerator::new(vec![reply]);
        let calendar = Arc::new(InMemoryCalendar::new(chrono_tz::America::New_York));
        let node = IndigoNode::new(services(generator.clone(), calendar).await);
        (node.run(&state, &StepSink::discard()).await, generator)
    }

    #[tokio::test]
    async fn test_structured_decision_sets_helper() {
        let (update, _) = run(
            Reply::Json(json!({
                "message": "Adding that now!",
                "helper_agent": "event_initializer"
            })),
            SharedState::with_user_message("Disneyland tomorrow from 8am to 5pm"),
        )
        .await;
        assert_eq!(update.helper_agent, Some(HelperAgent::EventInitializer));
        assert_eq!(update.latest_content(), "Adding that now!");
    }

    #[tokio::test]
    async fn test_delegation_ignores_message_text() {
        let (update, _) = run(
            Reply::Json(json!({
                "message": "I'll ask the event_editor to cancel it.",
                "helper_agent": "none"
            })),
            SharedState::with_user_message("hmm"),
        )
        .await;
        assert_eq!(update.helper_agent, Some(HelperAgent::None));
    }

    #[tokio::test]
    async fn test_malformed_output_becomes_raw_message() {
        let (update, _) = run(
            Reply::Raw("Sure! Here's your schedule.".into()),
            SharedState::with_user_message("schedule?"),
        )
        .await;
        assert_eq!(update.latest_content(), "Sure! Here's your schedule.");
        assert_eq!(update.helper_agent, Some(HelperAgent::None));

        let (update, _) = run(
            Reply::Json(json!({"message": "x", "helper_agent": "wizard"})),
            SharedState::default(),
        )
        .await;
        assert_eq!(update.helper_agent, Some(HelperAgent::None));
    }

    #[tokio::test]
    async fn test_generation_failure_apologizes() {
        let (update, _) = run(Reply::Fail("quota".into()), SharedState::default()).await;
        assert!(update.latest_content().starts_with("Sorry"));
        assert!(update.latest_content().contains("quota"));
        assert_eq!(update.helper_agent, Some(HelperAgent::None));
    }

    #[tokio::test]
    async fn test_context_reaches_instructions() {
        let state = SharedState {
            context: "Busy 12:00-13:00 tomorrow".into(),
            ..SharedState::with_user_message("hi")
        };
        let (update, generator) = run(
            Reply::Json(json!({"message": "", "helper_agent": "none"})),
            state,
        )
        .await;
        assert!(update.messages.is_empty());
        let system = &generator.requests()[0].system;
        assert!(system.contains("Busy 12:00-13:00 tomorrow"));
        assert!(system.contains("America/New_York"));
        assert!(system.contains("only when the calendar context below does not already answer"));
        assert!(system.contains("clarifying follow-up question"));
        assert!(system.contains("event_initializer: for requests to create new events"));
        assert!(system.contains("event_editor: for requests to update or delete"));
    }
}
