//! Event Initializer: drafts `add_event` calls for the events a user describes

use std::sync::Arc;

use async_trait::async_trait;

use super::AgentServices;
use crate::ai::types::ToolChoice;
use crate::graph::{
    tools_condition, Agent, GraphError, Node, SharedState, StateUpdate, StepSink, Successor,
    ToolNode, TOOL_NODE,
};
use crate::tools::implementations::ADD_EVENT;

pub const NAME: &str = "event_initializer";

const TOOLS: &[&str] = &[ADD_EVENT];

pub fn event_initializer(services: &AgentServices) -> Result<Agent, GraphError> {
    let tool_node = ToolNode::new(services.tools.clone(), services.tool_context.clone(), TOOLS);
    Agent::builder(NAME)
        .node(
            "initialize",
            Arc::new(InitializeNode(services.clone())),
            Successor::Branch {
                select: tools_condition,
                targets: &[TOOL_NODE],
            },
        )
        .node(TOOL_NODE, Arc::new(tool_node), Successor::End)
        .start(Successor::Next("initialize"))
        .max_steps(services.settings.max_steps)
        .build()
}

struct InitializeNode(AgentServices);

#[async_trait]
impl Node for InitializeNode {
    async fn run(&self, state: &SharedState, _sink: &StepSink) -> StateUpdate {
        let services = &self.0;
        let message = services
            .tool_turn(
                NAME,
                &instructions(services),
                &state.messages,
                TOOLS,
                ToolChoice::Auto,
            )
            .await;
        StateUpdate::message(message)
    }
}

fn instructions(services: &AgentServices) -> String {
    format!(
        "You are the Event Initializer for Indigo, a time management assistant.\n\
         Read the conversation and call add_event once for every distinct event the \
         user wants created. Several events mean several calls.\n\
         Give each event a short summary, an ISO 8601 startTime and endTime, and the \
         user's timeZone ({tz}) unless they name another one. When no end or duration \
         is given, the event lasts one hour. Do not invent a description, location, \
         color or recurrence the user did not ask for.\n\
         Resolve relative dates such as \"tomorrow\" against the current time. \
         Right now it is {now}.",
        tz = services.clock.timezone().name(),
        now = services.clock.describe()
    )
}
