//! Add event tool - create a calendar event

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::fields::{
    calendar_error, color_id, event_time, non_blank, parse_time, resolve_timezone, Recurrence,
};
use super::ADD_EVENT;
use crate::calendar::Event;
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct AddEventTool;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Params {
    summary: String,
    #[serde(alias = "start_time")]
    start_time: String,
    #[serde(alias = "end_time")]
    end_time: String,
    #[serde(default, alias = "time_zone")]
    time_zone: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default, alias = "color_id")]
    color_id: Option<Value>,
    #[serde(default)]
    recurrence: Option<Recurrence>,
}

#[async_trait]
impl Tool for AddEventTool {
    fn name(&self) -> &str {
        ADD_EVENT
    }

    fn description(&self) -> &str {
        "Create a calendar event. Times are ISO 8601 date-times (e.g. 2024-10-18T08:00:00) read in timeZone. Call once per distinct event."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "Title of the event"
                },
                "startTime": {
                    "type": "string",
                    "description": "Start date-time, e.g. 2024-10-18T08:00:00"
                },
                "endTime": {
                    "type": "string",
                    "description": "End date-time, after startTime"
                },
                "timeZone": {
                    "type": "string",
                    "description": "IANA timezone, e.g. America/New_York (defaults to the user's timezone)"
                },
                "description": {
                    "type": "string",
                    "description": "Event notes"
                },
                "location": {
                    "type": "string",
                    "description": "Where the event takes place"
                },
                "colorId": {
                    "type": "string",
                    "description": "Calendar color id from \"1\" to \"11\""
                },
                "recurrence": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "RFC 5545 lines, e.g. [\"RRULE:FREQ=WEEKLY;BYDAY=MO\"]"
                }
            },
            "required": ["summary", "startTime", "endTime"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let event = match build_event(params, ctx) {
            Ok(event) => event,
            Err(e) => return e,
        };

        match ctx.calendar.insert(&event).await {
            Ok(stored) => ToolResult::success_data(stored.pruned()),
            Err(e) => calendar_error(e),
        }
    }
}

fn build_event(params: Params, ctx: &ToolContext) -> Result<Event, ToolResult> {
    let summary = non_blank(Some(params.summary))
        .ok_or_else(|| ToolResult::invalid_parameters("summary must not be empty"))?;
    let tz = resolve_timezone(params.time_zone.as_deref(), ctx)?;
    let start = parse_time("startTime", &params.start_time, tz)?;
    let end = parse_time("endTime", &params.end_time, tz)?;
    if end <= start {
        return Err(ToolResult::invalid_parameters(
            "endTime must be after startTime",
        ));
    }

    Ok(Event {
        summary: Some(summary),
        description: non_blank(params.description),
        location: non_blank(params.location),
        color_id: color_id(params.color_id)?,
        start: Some(event_time(&start, tz)),
        end: Some(event_time(&end, tz)),
        recurrence: params
            .recurrence
            .map(Recurrence::into_rules)
            .unwrap_or_default(),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarBackend, InMemoryCalendar};
    use crate::time::Clock;
    use std::sync::Arc;

    fn context() -> (Arc<InMemoryCalendar>, ToolContext) {
        let calendar = Arc::new(InMemoryCalendar::new(chrono_tz::America::New_York));
        let ctx = ToolContext::new(calendar.clone(), Clock::new(chrono_tz::America::New_York));
        (calendar, ctx)
    }

    #[tokio::test]
    async fn test_add_event_stores_wall_clock_times() {
        let (calendar, ctx) = context();
        let result = AddEventTool
            .execute(
                json!({
                    "summary": "Disneyland",
                    "startTime": "2024-10-18T08:00:00",
                    "endTime": "2024-10-18T17:00:00",
                    "timeZone": "America/New_York",
                    "recurrence": "FREQ=YEARLY"
                }),
                &ctx,
            )
            .await;
        assert!(!result.is_error, "{}", result.output);

        let data = result.data().unwrap();
        assert_eq!(data["summary"], "Disneyland");
        assert_eq!(data["start"]["dateTime"], "2024-10-18T08:00:00");
        assert_eq!(data["end"]["timeZone"], "America/New_York");
        assert_eq!(data["recurrence"][0], "RRULE:FREQ=YEARLY");

        let id = data["id"].as_str().unwrap();
        let stored = calendar.get(id).await.unwrap();
        assert_eq!(stored.summary.as_deref(), Some("Disneyland"));
    }

    #[tokio::test]
    async fn test_add_event_defaults_timezone_and_converts_offsets() {
        let (_, ctx) = context();
        let result = AddEventTool
            .execute(
                json!({
                    "summary": "Call",
                    "startTime": "2024-10-18T14:00:00Z",
                    "endTime": "2024-10-18T15:00:00Z"
                }),
                &ctx,
            )
            .await;
        let data = result.data().unwrap();
        assert_eq!(data["start"]["dateTime"], "2024-10-18T10:00:00");
        assert_eq!(data["start"]["timeZone"], "America/New_York");
    }

    #[tokio::test]
    async fn test_add_event_validation_errors() {
        let (calendar, ctx) = context();
        for params in [
            json!({
                "summary": "X",
                "startTime": "2024-10-18T10:00:00",
                "endTime": "2024-10-18T09:00:00"
            }),
            json!({"summary": "X", "startTime": "soon", "endTime": "2024-10-18T09:00:00"}),
            json!({
                "summary": "X",
                "startTime": "2024-10-18T10:00:00",
                "endTime": "2024-10-18T11:00:00",
                "timeZone": "Nowhere/City"
            }),
            json!({
                "summary": " ",
                "startTime": "2024-10-18T10:00:00",
                "endTime": "2024-10-18T11:00:00"
            }),
            json!({}),
        ] {
            let result = AddEventTool.execute(params, &ctx).await;
            assert!(result.is_error);
            let parsed: Value = serde_json::from_str(&result.output).unwrap();
            assert_eq!(parsed["error"]["code"], "invalid_parameters");
        }
        assert!(calendar.snapshot().await.is_empty());
    }
}
