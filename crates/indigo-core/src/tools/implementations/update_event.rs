//! Update event tool - merge changes over an existing event

use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use serde_json::{json, Value};

use super::fields::{
    calendar_error, color_id, event_time, non_blank, parse_time, resolve_timezone, Recurrence,
};
use super::{NOTHING_TO_UPDATE, UPDATE_EVENT};
use crate::calendar::Event;
use crate::time::parse_timezone;
use crate::tools::normalize::is_empty_arguments;
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct UpdateEventTool;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Params {
    #[serde(default, alias = "id", alias = "event_id")]
    event_id: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default, alias = "start_time")]
    start_time: Option<String>,
    #[serde(default, alias = "end_time")]
    end_time: Option<String>,
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

impl Params {
    fn has_changes(&self) -> bool {
        self.summary.is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
            || self.time_zone.is_some()
            || self.description.is_some()
            || self.location.is_some()
            || self.color_id.is_some()
            || self.recurrence.is_some()
    }
}

#[async_trait]
impl Tool for UpdateEventTool {
    fn name(&self) -> &str {
        UPDATE_EVENT
    }

    fn description(&self) -> &str {
        "Update a calendar event by id. Only pass the fields that change; everything else, including the duration when only startTime moves, is kept. Call with empty arguments when there is nothing to update."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "eventId": {
                    "type": "string",
                    "description": "Id of the event to update"
                },
                "summary": {"type": "string", "description": "New title"},
                "startTime": {
                    "type": "string",
                    "description": "New start date-time, e.g. 2024-10-18T09:00:00"
                },
                "endTime": {"type": "string", "description": "New end date-time"},
                "timeZone": {
                    "type": "string",
                    "description": "IANA timezone for the new times"
                },
                "description": {"type": "string", "description": "New notes"},
                "location": {"type": "string", "description": "New location"},
                "colorId": {
                    "type": "string",
                    "description": "Calendar color id from \"1\" to \"11\""
                },
                "recurrence": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Replacement RFC 5545 lines"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        if is_empty_arguments(&params) {
            return ToolResult::success(NOTHING_TO_UPDATE);
        }
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let Some(id) = non_blank(params.event_id.clone()) else {
            if params.has_changes() {
                return ToolResult::invalid_parameters("eventId is required to update an event");
            }
            return ToolResult::success(NOTHING_TO_UPDATE);
        };

        let existing = match ctx.calendar.get(&id).await {
            Ok(event) => event,
            Err(e) => return calendar_error(e),
        };
        let merged = match merge(existing, params, ctx) {
            Ok(event) => event,
            Err(e) => return e,
        };

        match ctx.calendar.update(&id, &merged).await {
            Ok(stored) => ToolResult::success_data(stored.pruned()),
            Err(e) => calendar_error(e),
        }
    }
}

/// Apply the provided fields over `event`.
///
/// Moving only the start keeps the old duration (one hour if unknown);
/// moving only the end keeps the start.
fn merge(mut event: Event, params: Params, ctx: &ToolContext) -> Result<Event, ToolResult> {
    let event_tz = event
        .start
        .as_ref()
        .and_then(|s| s.time_zone.as_deref())
        .and_then(|name| parse_timezone(name).ok());
    let tz = match params.time_zone.as_deref() {
        Some(_) => resolve_timezone(params.time_zone.as_deref(), ctx)?,
        None => event_tz.unwrap_or_else(|| ctx.clock.timezone()),
    };

    let old_start = event.starts_at(tz);
    let old_end = event.ends_at(tz);
    let new_start = non_blank(params.start_time)
        .map(|raw| parse_time("startTime", &raw, tz))
        .transpose()?;
    let new_end = non_blank(params.end_time)
        .map(|raw| parse_time("endTime", &raw, tz))
        .transpose()?;

    let times = match (new_start, new_end) {
        (Some(start), Some(end)) => Some((start, end)),
        (Some(start), None) => {
            let duration = match (old_start, old_end) {
                (Some(s), Some(e)) if e > s => e - s,
                _ => Duration::hours(1),
            };
            Some((start, start + duration))
        }
        (None, Some(end)) => {
            let start = old_start.ok_or_else(|| {
                ToolResult::invalid_parameters("event has no start; pass startTime too")
            })?;
            Some((start, end))
        }
        // A bare timezone change re-expresses the same instants.
        (None, None) if params.time_zone.is_some() => old_start.zip(old_end),
        (None, None) => None,
    };

    if let Some((start, end)) = times {
        if end <= start {
            return Err(ToolResult::invalid_parameters(
                "endTime must be after startTime",
            ));
        }
        event.start = Some(event_time(&start, tz));
        event.end = Some(event_time(&end, tz));
    }

    if let Some(summary) = non_blank(params.summary) {
        event.summary = Some(summary);
    }
    if let Some(description) = params.description {
        event.description = Some(description);
    }
    if let Some(location) = params.location {
        event.location = Some(location);
    }
    if let Some(color) = color_id(params.color_id)? {
        event.color_id = Some(color);
    }
    if let Some(recurrence) = params.recurrence {
        event.recurrence = recurrence.into_rules();
    }
    Ok(event)
}
