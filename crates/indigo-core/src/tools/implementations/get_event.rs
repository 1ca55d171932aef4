//! Get event tool - fetch one event by id

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::fields::{calendar_error, non_blank};
use super::GET_EVENT;
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct GetEventTool;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Params {
    #[serde(alias = "id", alias = "event_id")]
    event_id: String,
}

#[async_trait]
impl Tool for GetEventTool {
    fn name(&self) -> &str {
        GET_EVENT
    }

    fn description(&self) -> &str {
        "Fetch a single calendar event by its id."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "eventId": {
                    "type": "string",
                    "description": "Id of the event"
                }
            },
            "required": ["eventId"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let Some(id) = non_blank(Some(params.event_id)) else {
            return ToolResult::invalid_parameters("eventId must not be empty");
        };

        match ctx.calendar.get(&id).await {
            Ok(event) => ToolResult::success_data(event.pruned()),
            Err(e) => calendar_error(e),
        }
    }
}
