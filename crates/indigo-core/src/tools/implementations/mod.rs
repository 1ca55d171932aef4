//! Tool implementations
//!
//! - add_event: Create an event
//! - list_events: List events matching filters
//! - get_event: Fetch one event by id
//! - update_event: Patch fields of an existing event
//! - delete_event: Remove an event

pub mod add_event;
pub mod delete_event;
mod fields;
pub mod get_event;
pub mod list_events;
pub mod update_event;

pub use add_event::AddEventTool;
pub use delete_event::DeleteEventTool;
pub use get_event::GetEventTool;
pub use list_events::ListEventsTool;
pub use update_event::UpdateEventTool;

use std::sync::Arc;

use crate::tools::registry::ToolRegistry;

pub const ADD_EVENT: &str = "add_event";
pub const LIST_EVENTS: &str = "list_events";
pub const GET_EVENT: &str = "get_event";
pub const UPDATE_EVENT: &str = "update_event";
pub const DELETE_EVENT: &str = "delete_event";

pub const NOTHING_TO_UPDATE: &str = "Nothing to update.";
pub const NOTHING_TO_DELETE: &str = "Nothing to delete.";

/// Register every calendar tool
pub async fn register_calendar_tools(registry: &ToolRegistry) {
    registry.register(Arc::new(AddEventTool)).await;
    registry.register(Arc::new(ListEventsTool)).await;
    registry.register(Arc::new(GetEventTool)).await;
    registry.register(Arc::new(UpdateEventTool)).await;
    registry.register(Arc::new(DeleteEventTool)).await;
}
