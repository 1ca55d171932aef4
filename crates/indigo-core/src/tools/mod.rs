//! Calendar tools
//!
//! Provides the tool registry and the calendar tool implementations the
//! agents bind to.

pub mod implementations;
pub mod normalize;
pub mod registry;

pub use implementations::register_calendar_tools;
pub use registry::{parse_params, Tool, ToolContext, ToolRegistry, ToolResult};
