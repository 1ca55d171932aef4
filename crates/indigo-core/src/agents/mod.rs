//! Scheduling agents
//!
//! ## Top level
//! - `assistant_graph` - contextualizer, then the Indigo router delegating to specialists
//!
//! ## Specialists
//! - `contextualizer` - summarizes the coming days into busy times
//! - `event_initializer` - creates events
//! - `event_lookup` - finds the events a request refers to
//! - `event_editor` - updates or deletes looked-up events

pub mod assistant;
pub mod contextualizer;
pub mod event_editor;
pub mod event_initializer;
pub mod event_lookup;
pub mod indigo;

pub use assistant::assistant_graph;
pub use contextualizer::contextualizer;
pub use event_editor::event_editor;
pub use event_initializer::event_initializer;
pub use event_lookup::event_lookup;
pub use indigo::IndigoNode;

use std::sync::Arc;
use std::time::Duration;

use crate::ai::generator::TextGenerator;
use crate::ai::types::{AiTool, Generation, Message, ToolChoice};
use crate::calendar::CalendarBackend;
use crate::constants::calendar::{CONTEXT_WINDOW_DAYS, TOOL_TIMEOUT};
use crate::constants::graph::DEFAULT_MAX_STEPS;
use crate::time::Clock;
use crate::tools::{register_calendar_tools, ToolContext, ToolRegistry};

/// Tunables shared by every agent
#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    /// Days of calendar the contextualizer summarizes
    pub context_days: i64,
    pub max_steps: usize,
    pub tool_timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            context_days: CONTEXT_WINDOW_DAYS,
            max_steps: DEFAULT_MAX_STEPS,
            tool_timeout: TOOL_TIMEOUT,
        }
    }
}

/// Everything an agent needs, built once at startup and handed to every
/// agent constructor.
#[derive(Clone)]
pub struct AgentServices {
    pub generator: Arc<dyn TextGenerator>,
    pub tools: Arc<ToolRegistry>,
    pub tool_context: Arc<ToolContext>,
    pub clock: Clock,
    pub settings: AgentSettings,
}

impl AgentServices {
    pub async fn new(
        generator: Arc<dyn TextGenerator>,
        calendar: Arc<dyn CalendarBackend>,
        clock: Clock,
        settings: AgentSettings,
    ) -> Self {
        let tools = ToolRegistry::new().with_default_timeout(settings.tool_timeout);
        register_calendar_tools(&tools).await;
        Self {
            generator,
            tools: Arc::new(tools),
            tool_context: Arc::new(ToolContext::new(calendar, clock)),
            clock,
            settings,
        }
    }

    /// One tool-capable generation turned into a message.
    ///
    /// A failed call becomes an assistant message naming the failure, so
    /// the graph carries on.
    pub(crate) async fn tool_turn(
        &self,
        agent: &str,
        system: &str,
        history: &[Message],
        tool_names: &[&str],
        choice: ToolChoice,
    ) -> Message {
        let tools: Vec<AiTool> = self.tools.ai_tools(tool_names).await;
        match self
            .generator
            .generate_with_tools(system, history, &tools, &choice)
            .await
        {
            Ok(generation) => {
                if let Generation::ToolCalls { calls, .. } = &generation {
                    tracing::info!(agent, calls = calls.len(), "Model requested tools");
                }
                generation.into_message()
            }
            Err(e) => {
                tracing::warn!(agent, error = %e, "Generation failed");
                Message::assistant(format!("The {agent} agent could not reach the model: {e}"))
            }
        }
    }
}
