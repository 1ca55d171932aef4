//! Agent graphs
//!
//! - `SharedState` / `StateUpdate` - per-thread conversation state and node output
//! - `Agent` - static node table interpreted by a small runner, streamable step by step
//! - `ToolNode` - executes requested tool calls

pub mod runner;
pub mod state;
pub mod tool_node;

pub use runner::{
    Agent, AgentBuilder, GraphError, Node, NodeId, Selector, Step, StepSink, Successor,
    Transition, STEP_LIMIT_NODE,
};
pub use state::{collapse_tool_results, HelperAgent, SharedState, StateUpdate};
pub use tool_node::{tools_condition, ToolNode, TOOL_NODE};
