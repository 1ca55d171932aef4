//! Generic node that executes the tool calls of the last assistant message

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use super::runner::{Node, NodeId, StepSink, Transition};
use super::state::{SharedState, StateUpdate};
use crate::ai::types::{AiToolCall, Message};
use crate::tools::{ToolContext, ToolRegistry, ToolResult};

/// Conventional id of the tool node inside an agent
pub const TOOL_NODE: NodeId = "tool";

/// Runs requested tool calls against the registry.
///
/// Only tools in `allowed` run; anything else answers with an
/// `unknown_tool` error so the model sees why.
pub struct ToolNode {
    registry: Arc<ToolRegistry>,
    ctx: Arc<ToolContext>,
    allowed: Vec<&'static str>,
}

impl ToolNode {
    pub fn new(
        registry: Arc<ToolRegistry>,
        ctx: Arc<ToolContext>,
        allowed: &[&'static str],
    ) -> Self {
        Self {
            registry,
            ctx,
            allowed: allowed.to_vec(),
        }
    }

    async fn execute(&self, call: &AiToolCall) -> Message {
        let result = if self.allowed.contains(&call.name.as_str()) {
            self.registry
                .execute(&call.name, call.arguments.clone(), &self.ctx)
                .await
        } else {
            None
        };
        let result = result.unwrap_or_else(|| {
            ToolResult::error_with_code("unknown_tool", format!("Unknown tool: {}", call.name))
        });
        Message::tool_result(&call.id, &call.name, result.output)
    }
}

#[async_trait]
impl Node for ToolNode {
    async fn run(&self, state: &SharedState, _sink: &StepSink) -> StateUpdate {
        let Some(message) = state.last_message().filter(|m| m.has_tool_calls()) else {
            return StateUpdate::default();
        };
        // Calls run concurrently; results keep call order
        let results = join_all(message.tool_calls.iter().map(|call| self.execute(call))).await;
        StateUpdate::messages(results)
    }
}

/// Route to the tool node when the last message requests tools
pub fn tools_condition(state: &SharedState) -> Transition {
    match state.last_message() {
        Some(message) if message.has_tool_calls() => Transition::To(TOOL_NODE),
        _ => Transition::End,
    }
}
