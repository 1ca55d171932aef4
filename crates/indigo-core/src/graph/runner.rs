//! Static node tables and the runner that interprets them

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use super::state::{HelperAgent, SharedState, StateUpdate};
use crate::ai::types::Message;
use crate::constants::graph::{DEFAULT_MAX_STEPS, STEP_LIMIT_MESSAGE};

pub type NodeId = &'static str;

/// Pseudo-node reported when a run is cut off by the step limit
pub const STEP_LIMIT_NODE: NodeId = "step_limit";

/// A unit of work in an agent graph: reads the state, returns a partial update.
///
/// Nodes never fail. Degraded results are expressed as messages.
#[async_trait]
pub trait Node: Send + Sync {
    async fn run(&self, state: &SharedState, sink: &StepSink) -> StateUpdate;
}

/// Where control goes after a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(NodeId),
    End,
}

pub type Selector = fn(&SharedState) -> Transition;

/// Static successor of a node (or of the entry point)
#[derive(Clone, Copy)]
pub enum Successor {
    Next(NodeId),
    End,
    /// Pure choice over the state; `targets` lists every node it may pick
    Branch {
        select: Selector,
        targets: &'static [NodeId],
    },
}

impl Successor {
    fn resolve(&self, state: &SharedState) -> Transition {
        match self {
            Successor::Next(id) => Transition::To(*id),
            Successor::End => Transition::End,
            Successor::Branch { select, .. } => select(state),
        }
    }

    fn targets(&self) -> Vec<NodeId> {
        match self {
            Successor::Next(id) => vec![*id],
            Successor::End => Vec::new(),
            Successor::Branch { targets, .. } => targets.to_vec(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GraphError {
    #[error("agent '{0}' has no entry point")]
    NoEntry(&'static str),
    #[error("agent '{agent}' registers node '{node}' twice")]
    DuplicateNode { agent: &'static str, node: NodeId },
    #[error("agent '{agent}': '{from}' leads to unknown node '{to}'")]
    UnknownTarget {
        agent: &'static str,
        from: NodeId,
        to: NodeId,
    },
}

/// Snapshot emitted after every node completes
#[derive(Debug, Clone)]
pub struct Step {
    /// Path of enclosing agent nodes; empty for the outermost agent
    pub namespace: Vec<NodeId>,
    pub node: NodeId,
    pub update: StateUpdate,
    /// State of the agent that ran the node, after the update
    pub state: SharedState,
}

impl Step {
    pub fn is_top_level(&self) -> bool {
        self.namespace.is_empty()
    }

    /// Innermost enclosing node, or "parent graph"
    pub fn namespace_label(&self) -> &str {
        self.namespace.last().copied().unwrap_or("parent graph")
    }
}

/// Receives step snapshots from a run and its nested agents
#[derive(Clone, Default)]
pub struct StepSink {
    tx: Option<mpsc::UnboundedSender<Step>>,
    namespace: Vec<NodeId>,
}

impl StepSink {
    pub fn new(tx: mpsc::UnboundedSender<Step>) -> Self {
        Self {
            tx: Some(tx),
            namespace: Vec::new(),
        }
    }

    /// Sink that drops every step
    pub fn discard() -> Self {
        Self::default()
    }

    pub fn namespace(&self) -> &[NodeId] {
        &self.namespace
    }

    fn nested(&self, node: NodeId) -> Self {
        let mut namespace = self.namespace.clone();
        namespace.push(node);
        Self {
            tx: self.tx.clone(),
            namespace,
        }
    }

    fn emit(&self, node: NodeId, update: StateUpdate, state: &SharedState) {
        if let Some(tx) = &self.tx {
            // A dropped receiver does not stop the run
            let _ = tx.send(Step {
                namespace: self.namespace.clone(),
                node,
                update,
                state: state.clone(),
            });
        }
    }
}

struct Entry {
    node: Arc<dyn Node>,
    successor: Successor,
}

/// A small directed graph of named nodes with one entry point.
///
/// Agents are nodes themselves, so one can be embedded in another.
pub struct Agent {
    name: &'static str,
    nodes: HashMap<NodeId, Entry>,
    start: Successor,
    max_steps: usize,
}

pub struct AgentBuilder {
    name: &'static str,
    nodes: Vec<(NodeId, Entry)>,
    start: Option<Successor>,
    max_steps: usize,
}

impl AgentBuilder {
    pub fn node(mut self, id: NodeId, node: Arc<dyn Node>, successor: Successor) -> Self {
        self.nodes.push((id, Entry { node, successor }));
        self
    }

    pub fn start(mut self, successor: Successor) -> Self {
        self.start = Some(successor);
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Check that every edge lands on a registered node
    pub fn build(self) -> Result<Agent, GraphError> {
        let agent = self.name;
        let start = self.start.ok_or(GraphError::NoEntry(agent))?;

        let mut nodes = HashMap::with_capacity(self.nodes.len());
        for (id, entry) in self.nodes {
            if nodes.insert(id, entry).is_some() {
                return Err(GraphError::DuplicateNode { agent, node: id });
            }
        }

        let edges = std::iter::once(("__start__", &start))
            .chain(nodes.iter().map(|(id, entry)| (*id, &entry.successor)));
        for (from, successor) in edges {
            if let Some(to) = successor
                .targets()
                .into_iter()
                .find(|to| !nodes.contains_key(to))
            {
                return Err(GraphError::UnknownTarget { agent, from, to });
            }
        }

        Ok(Agent {
            name: agent,
            nodes,
            start,
            max_steps: self.max_steps.max(1),
        })
    }
}

impl Agent {
    pub fn builder(name: &'static str) -> AgentBuilder {
        AgentBuilder {
            name,
            nodes: Vec::new(),
            start: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Run to completion
    pub async fn invoke(&self, state: SharedState) -> SharedState {
        self.run_with_sink(state, &StepSink::discard()).await
    }

    /// Lazily run the agent, yielding a [`Step`] after every node,
    /// nested agents included. Nothing runs until the stream is polled.
    ///
    /// Once started the run finishes even if the stream is dropped.
    pub fn stream(
        self: &Arc<Self>,
        state: SharedState,
    ) -> impl Stream<Item = Step> + Send + 'static {
        let agent = Arc::clone(self);
        futures::stream::once(async move {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(async move {
                agent.run_with_sink(state, &StepSink::new(tx)).await;
            });
            UnboundedReceiverStream::new(rx)
        })
        .flatten()
    }

    /// Run to completion, reporting steps to `sink`
    pub async fn run_with_sink(&self, mut state: SharedState, sink: &StepSink) -> SharedState {
        let mut next = self.start.resolve(&state);
        let mut steps = 0usize;

        while let Transition::To(id) = next {
            if steps >= self.max_steps {
                warn!(agent = self.name, max_steps = self.max_steps, "Step limit reached");
                let update = StateUpdate::message(Message::assistant(STEP_LIMIT_MESSAGE))
                    .with_helper(HelperAgent::None);
                state.apply(update.clone());
                sink.emit(STEP_LIMIT_NODE, update, &state);
                break;
            }
            let Some(entry) = self.nodes.get(id) else {
                warn!(agent = self.name, node = id, "Selector chose an unknown node; ending run");
                break;
            };

            steps += 1;
            info!(agent = self.name, node = id, step = steps, "Running node");
            let update = entry.node.run(&state, &sink.nested(id)).await;
            debug!(
                agent = self.name,
                node = id,
                messages = update.messages.len(),
                "Node finished"
            );
            state.apply(update.clone());
            sink.emit(id, update, &state);
            next = entry.successor.resolve(&state);
        }
        state
    }
}

#[async_trait]
impl Node for Agent {
    /// The messages this agent appended plus its final scalars
    async fn run(&self, state: &SharedState, sink: &StepSink) -> StateUpdate {
        let before = state.messages.len();
        let done = self.run_with_sink(state.clone(), sink).await;
        let context = (done.context != state.context).then_some(done.context);
        StateUpdate {
            messages: done.messages.into_iter().skip(before).collect(),
            helper_agent: done.helper_agent,
            context,
            preserve_batches: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Appends a fixed assistant message
    struct Say(&'static str);

    #[async_trait]
    impl Node for Say {
        async fn run(&self, _state: &SharedState, _sink: &StepSink) -> StateUpdate {
            StateUpdate::message(Message::assistant(self.0))
        }
    }

    fn say(text: &'static str) -> Arc<dyn Node> {
        Arc::new(Say(text))
    }

    fn ends_after_two(state: &SharedState) -> Transition {
        if state.messages.len() >= 3 {
            Transition::End
        } else {
            Transition::To("again")
        }
    }

    #[tokio::test]
    async fn test_linear_agent_runs_in_order() {
        let agent = Agent::builder("linear")
            .node("a", say("first"), Successor::Next("b"))
            .node("b", say("second"), Successor::End)
            .start(Successor::Next("a"))
            .build()
            .unwrap();

        let state = agent.invoke(SharedState::with_user_message("hi")).await;
        let contents: Vec<_> = state.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "first", "second"]);
    }

    #[tokio::test]
    async fn test_branch_loops_until_selector_ends() {
        let agent = Agent::builder("loop")
            .node(
                "again",
                say("tick"),
                Successor::Branch {
                    select: ends_after_two,
                    targets: &["again"],
                },
            )
            .start(Successor::Next("again"))
            .build()
            .unwrap();

        let state = agent.invoke(SharedState::with_user_message("go")).await;
        assert_eq!(state.messages.len(), 3);
    }

    #[tokio::test]
    async fn test_step_limit_ends_with_message() {
        fn forever(_: &SharedState) -> Transition {
            Transition::To("spin")
        }
        let agent = Agent::builder("spinner")
            .node(
                "spin",
                say("again"),
                Successor::Branch {
                    select: forever,
                    targets: &["spin"],
                },
            )
            .start(Successor::Next("spin"))
            .max_steps(4)
            .build()
            .unwrap();

        let state = agent.invoke(SharedState::default()).await;
        assert_eq!(state.messages.len(), 5);
        assert_eq!(state.messages[4].content, STEP_LIMIT_MESSAGE);
        assert_eq!(state.helper_agent, Some(HelperAgent::None));
    }

    #[test]
    fn test_build_rejects_unknown_targets() {
        let err = Agent::builder("broken")
            .node("a", say("x"), Successor::Next("missing"))
            .start(Successor::Next("a"))
            .build()
            .err()
            .unwrap();
        assert_eq!(
            err,
            GraphError::UnknownTarget {
                agent: "broken",
                from: "a",
                to: "missing"
            }
        );

        assert_eq!(
            Agent::builder("empty").build().err(),
            Some(GraphError::NoEntry("empty"))
        );
    }

    #[tokio::test]
    async fn test_stream_reports_nested_namespaces() {
        let inner = Agent::builder("inner")
            .node("x", say("inner-x"), Successor::Next("y"))
            .node("y", say("inner-y"), Successor::End)
            .start(Successor::Next("x"))
            .build()
            .unwrap();
        let outer = Arc::new(
            Agent::builder("outer")
                .node("sub", Arc::new(inner), Successor::Next("last"))
                .node("last", say("outer-last"), Successor::End)
                .start(Successor::Next("sub"))
                .build()
                .unwrap(),
        );

        let steps: Vec<Step> = outer
            .stream(SharedState::with_user_message("hi"))
            .collect()
            .await;
        let seen: Vec<_> = steps
            .iter()
            .map(|s| (s.namespace.clone(), s.node, s.update.latest_content().to_string()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (vec!["sub"], "x", "inner-x".to_string()),
                (vec!["sub"], "y", "inner-y".to_string()),
                (vec![], "sub", "inner-y".to_string()),
                (vec![], "last", "outer-last".to_string()),
            ]
        );
        assert_eq!(steps[0].namespace_label(), "sub");
        assert_eq!(steps[3].namespace_label(), "parent graph");
        assert_eq!(steps[3].state.messages.len(), 4);
    }
}
