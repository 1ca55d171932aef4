//! The top-level orchestration graph:
//! contextualizer (first turn only), then Indigo, which may hand the turn
//! to one specialist at a time and always gets it back.

use std::sync::Arc;

use super::{
    contextualizer, event_editor, event_initializer, event_lookup, AgentServices, IndigoNode,
};
use crate::graph::{Agent, GraphError, HelperAgent, SharedState, Successor, Transition};

pub const NAME: &str = "assistant";

const CONTEXTUALIZER: &str = contextualizer::NAME;
const INDIGO: &str = "indigo";
const EVENT_INITIALIZER: &str = event_initializer::NAME;
const EVENT_LOOKUP: &str = event_lookup::NAME;
const EVENT_EDITOR: &str = event_editor::NAME;

pub fn assistant_graph(services: &AgentServices) -> Result<Agent, GraphError> {
    Agent::builder(NAME)
        .start(Successor::Branch {
            select: needs_context,
            targets: &[CONTEXTUALIZER, INDIGO],
        })
        .node(
            CONTEXTUALIZER,
            Arc::new(contextualizer(services)?),
            Successor::Next(INDIGO),
        )
        .node(
            INDIGO,
            Arc::new(IndigoNode::new(services.clone())),
            Successor::Branch {
                select: route,
                targets: &[EVENT_INITIALIZER, EVENT_LOOKUP, EVENT_EDITOR, INDIGO],
            },
        )
        .node(
            EVENT_INITIALIZER,
            Arc::new(event_initializer(services)?),
            Successor::Next(INDIGO),
        )
        .node(
            EVENT_LOOKUP,
            Arc::new(event_lookup(services)?),
            Successor::Next(INDIGO),
        )
        .node(
            EVENT_EDITOR,
            Arc::new(event_editor(services)?),
            Successor::Next(INDIGO),
        )
        .max_steps(services.settings.max_steps)
        .build()
}

fn needs_context(state: &SharedState) -> Transition {
    if state.context.is_empty() {
        Transition::To(CONTEXTUALIZER)
    } else {
        Transition::To(INDIGO)
    }
}

fn route(state: &SharedState) -> Transition {
    match state.helper_agent {
        Some(HelperAgent::EventInitializer) => Transition::To(EVENT_INITIALIZER),
        Some(HelperAgent::EventLookup) => Transition::To(EVENT_LOOKUP),
        Some(HelperAgent::EventEditor) => Transition::To(EVENT_EDITOR),
        Some(HelperAgent::Indigo) => Transition::To(INDIGO),
        Some(HelperAgent::None) | None => Transition::End,
    }
}
