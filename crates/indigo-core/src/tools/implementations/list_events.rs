//! List events tool - query a window of the calendar

use async_trait::async_trait;
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Value};

use super::fields::{calendar_error, non_blank, parse_time, resolve_timezone};
use super::LIST_EVENTS;
use crate::calendar::{Event, ListFilters, OrderBy};
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

const MAX_RESULTS_LIMIT: u32 = 2500;

pub struct ListEventsTool;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Params {
    #[serde(default, alias = "time_min")]
    time_min: Option<String>,
    #[serde(default, alias = "time_max")]
    time_max: Option<String>,
    #[serde(default, alias = "max_results")]
    max_results: Option<i64>,
    #[serde(default, alias = "order_by")]
    order_by: Option<String>,
    #[serde(default, alias = "single_events")]
    single_events: Option<bool>,
    #[serde(default, alias = "time_zone")]
    time_zone: Option<String>,
    #[serde(default, alias = "show_deleted")]
    show_deleted: Option<bool>,
    #[serde(default, alias = "updated_min")]
    updated_min: Option<String>,
    #[serde(default)]
    q: Option<String>,
    /// Accepted for compatibility; the configured calendar is always used.
    #[serde(default, alias = "calendar_id")]
    #[allow(dead_code)]
    calendar_id: Option<String>,
}

#[async_trait]
impl Tool for ListEventsTool {
    fn name(&self) -> &str {
        LIST_EVENTS
    }

    fn description(&self) -> &str {
        "List calendar events. timeMin is an exclusive bound on an event's end, timeMax an exclusive bound on its start. Set singleEvents=true and orderBy=startTime to expand recurring events in order."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "timeMin": {
                    "type": "string",
                    "description": "Lower bound for event end, e.g. 2024-10-17T14:00:00-04:00"
                },
                "timeMax": {
                    "type": "string",
                    "description": "Upper bound for event start"
                },
                "maxResults": {
                    "type": "integer",
                    "description": "Maximum number of events (1-2500)"
                },
                "orderBy": {
                    "type": "string",
                    "enum": ["startTime", "updated"],
                    "description": "Sort order; startTime requires singleEvents=true"
                },
                "singleEvents": {
                    "type": "boolean",
                    "description": "Expand recurring events into instances"
                },
                "timeZone": {
                    "type": "string",
                    "description": "IANA timezone for the response and for naive bounds"
                },
                "showDeleted": {
                    "type": "boolean",
                    "description": "Include cancelled events"
                },
                "updatedMin": {
                    "type": "string",
                    "description": "Only events modified after this time"
                },
                "q": {
                    "type": "string",
                    "description": "Free-text search terms"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let (filters, warnings) = match build_filters(params, ctx) {
            Ok(built) => built,
            Err(e) => return e,
        };
        tracing::debug!(?filters, "Listing events");

        match ctx.calendar.list(&filters).await {
            Ok(events) => {
                let pruned = events.iter().map(Event::pruned).collect();
                ToolResult::success_data_with(Value::Array(pruned), warnings)
            }
            Err(e) => calendar_error(e),
        }
    }
}

fn build_filters(
    params: Params,
    ctx: &ToolContext,
) -> Result<(ListFilters, Vec<String>), ToolResult> {
    let mut warnings = Vec::new();
    let tz = resolve_timezone(params.time_zone.as_deref(), ctx)?;

    let time_min = bound("timeMin", params.time_min, tz)?;
    let time_max = bound("timeMax", params.time_max, tz)?;
    if let (Some(min), Some(max)) = (&time_min, &time_max) {
        if min >= max {
            return Err(ToolResult::invalid_parameters(
                "timeMin must be before timeMax",
            ));
        }
    }
    let updated_min = bound("updatedMin", params.updated_min, tz)?;

    let max_results = params.max_results.map(|n| {
        let clamped = n.clamp(1, MAX_RESULTS_LIMIT as i64) as u32;
        if clamped as i64 != n {
            warnings.push(format!("maxResults {n} clamped to {clamped}"));
        }
        clamped
    });

    let mut order_by = match non_blank(params.order_by).as_deref() {
        None => None,
        Some(raw) => Some(parse_order_by(raw)?),
    };
    if order_by == Some(OrderBy::StartTime) && params.single_events != Some(true) {
        warnings.push("orderBy=startTime requires singleEvents=true; ordering dropped".into());
        order_by = None;
    }

    let filters = ListFilters {
        time_min: time_min.map(|t| t.to_rfc3339()),
        time_max: time_max.map(|t| t.to_rfc3339()),
        max_results,
        order_by,
        single_events: params.single_events,
        time_zone: Some(tz.name().to_string()),
        show_deleted: params.show_deleted,
        updated_min: updated_min.map(|t| t.to_rfc3339()),
        q: non_blank(params.q),
    };
    Ok((filters, warnings))
}

fn bound(
    field: &str,
    raw: Option<String>,
    tz: Tz,
) -> Result<Option<chrono::DateTime<Tz>>, ToolResult> {
    non_blank(raw)
        .map(|raw| parse_time(field, &raw, tz))
        .transpose()
}

fn parse_order_by(raw: &str) -> Result<OrderBy, ToolResult> {
    match raw.to_ascii_lowercase().replace('_', "").as_str() {
        "starttime" => Ok(OrderBy::StartTime),
        "updated" => Ok(OrderBy::Updated),
        _ => Err(ToolResult::invalid_parameters(format!(
            "orderBy must be \"startTime\" or \"updated\", got \"{raw}\""
        ))),
    }
}
