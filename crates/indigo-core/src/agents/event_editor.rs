//! Event Editor: looks events up, then updates or deletes them

use std::sync::Arc;

use async_trait::async_trait;

use super::event_lookup::event_lookup;
use super::AgentServices;
use crate::ai::types::ToolChoice;
use crate::graph::{
    tools_condition, Agent, GraphError, Node, SharedState, StateUpdate, StepSink, Successor,
    ToolNode, TOOL_NODE,
};
use crate::tools::implementations::{DELETE_EVENT, UPDATE_EVENT};

pub const NAME: &str = "event_editor";

const TOOLS: &[&str] = &[UPDATE_EVENT, DELETE_EVENT];

pub fn event_editor(services: &AgentServices) -> Result<Agent, GraphError> {
    let tool_node = ToolNode::new(services.tools.clone(), services.tool_context.clone(), TOOLS);
    Agent::builder(NAME)
        .node("lookup", Arc::new(event_lookup(services)?), Successor::Next("edit"))
        .node(
            "edit",
            Arc::new(EditNode(services.clone())),
            Successor::Branch {
                select: tools_condition,
                targets: &[TOOL_NODE],
            },
        )
        .node(TOOL_NODE, Arc::new(tool_node), Successor::End)
        .start(Successor::Next("lookup"))
        .max_steps(services.settings.max_steps)
        .build()
}

struct EditNode(AgentServices);

#[async_trait]
impl Node for EditNode {
    async fn run(&self, state: &SharedState, _sink: &StepSink) -> StateUpdate {
        let services = &self.0;
        let message = services
            .tool_turn(
                NAME,
                &instructions(services),
                &state.messages,
                TOOLS,
                ToolChoice::Any,
            )
            .await;
        StateUpdate::message(message)
    }
}

fn instructions(services: &AgentServices) -> String {
    format!(
        "You are the Event Editor for Indigo, a time management assistant.\n\
         The last tool result holds the events the user's request refers to. For each \
         of them make exactly one call: update_event to change it or delete_event to \
         remove it. Pass the eventId plus only the fields that change; everything else, \
         including the duration, is kept for you.\n\
         If no matching events were found, make a single call with empty arguments to \
         update_event or delete_event, whichever the user asked for.\n\
         Times are ISO 8601 in the user's timezone ({tz}). Right now it is {now}.",
        tz = services.clock.timezone().name(),
        now = services.clock.describe()
    )
}
