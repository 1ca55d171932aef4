//! Delete event tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::fields::{calendar_error, non_blank};
use super::{DELETE_EVENT, NOTHING_TO_DELETE};
use crate::tools::normalize::is_empty_arguments;
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct DeleteEventTool;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Params {
    #[serde(default, alias = "id", alias = "event_id")]
    event_id: Option<String>,
}

#[async_trait]
impl Tool for DeleteEventTool {
    fn name(&self) -> &str {
        DELETE_EVENT
    }

    fn description(&self) -> &str {
        "Delete a calendar event by id. Call with empty arguments when there is nothing to delete."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "eventId": {
                    "type": "string",
                    "description": "Id of the event to delete"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        if is_empty_arguments(&params) {
            return ToolResult::success(NOTHING_TO_DELETE);
        }
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let Some(id) = non_blank(params.event_id) else {
            return ToolResult::success(NOTHING_TO_DELETE);
        };

        match ctx.calendar.delete(&id).await {
            Ok(()) => ToolResult::success_data(json!({ "deleted": id })),
            Err(e) => calendar_error(e),
        }
    }
}
