//! Field coercion shared by the event tools

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;

use crate::calendar::{CalendarError, EventDateTime};
use crate::time::{parse_timestamp, parse_timezone, wall_clock};
use crate::tools::registry::{ToolContext, ToolResult};

const RECURRENCE_PREFIXES: &[&str] = &["RRULE:", "EXRULE:", "RDATE:", "EXDATE:"];

/// Recurrence given as one rule or a list of rules
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum Recurrence {
    One(String),
    Many(Vec<String>),
}

impl Recurrence {
    /// Trimmed RFC 5545 lines; a bare `FREQ=...` gets its `RRULE:` prefix.
    pub(super) fn into_rules(self) -> Vec<String> {
        let lines = match self {
            Recurrence::One(line) => vec![line],
            Recurrence::Many(lines) => lines,
        };
        lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .map(|line| {
                let upper = line.to_ascii_uppercase();
                if RECURRENCE_PREFIXES.iter().any(|p| upper.starts_with(p)) {
                    line
                } else {
                    format!("RRULE:{line}")
                }
            })
            .collect()
    }
}

/// Explicit timezone if given and valid, else the user's timezone
pub(super) fn resolve_timezone(raw: Option<&str>, ctx: &ToolContext) -> Result<Tz, ToolResult> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => parse_timezone(name).map_err(ToolResult::invalid_parameters),
        None => Ok(ctx.clock.timezone()),
    }
}

pub(super) fn parse_time(field: &str, raw: &str, tz: Tz) -> Result<DateTime<Tz>, ToolResult> {
    parse_timestamp(raw, tz)
        .map_err(|e| ToolResult::invalid_parameters(format!("{field}: {e}")))
}

pub(super) fn event_time(dt: &DateTime<Tz>, tz: Tz) -> EventDateTime {
    EventDateTime::timed(wall_clock(&dt.with_timezone(&tz)), tz.name())
}

/// Google event colors are "1" to "11"; models sometimes send numbers.
pub(super) fn color_id(raw: Option<Value>) -> Result<Option<String>, ToolResult> {
    let text = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(ToolResult::invalid_parameters(format!(
                "colorId must be a string, got {other}"
            )))
        }
    };
    match text.parse::<u8>() {
        Ok(1..=11) => Ok(Some(text)),
        _ => Err(ToolResult::invalid_parameters(format!(
            "colorId must be between \"1\" and \"11\", got \"{text}\""
        ))),
    }
}

pub(super) fn calendar_error(error: CalendarError) -> ToolResult {
    ToolResult::error_with_code(error.code(), error)
}

/// Non-blank trimmed text
pub(super) fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recurrence_rules() {
        let one: Recurrence = serde_json::from_value(json!("FREQ=WEEKLY;BYDAY=MO")).unwrap();
        assert_eq!(one.into_rules(), vec!["RRULE:FREQ=WEEKLY;BYDAY=MO"]);

        let many: Recurrence =
            serde_json::from_value(json!(["RRULE:FREQ=DAILY;COUNT=3", " ", "EXDATE:20241020"]))
                .unwrap();
        assert_eq!(
            many.into_rules(),
            vec!["RRULE:FREQ=DAILY;COUNT=3", "EXDATE:20241020"]
        );
    }

    #[test]
    fn test_color_id_coercion() {
        assert_eq!(color_id(Some(json!(5))).unwrap(), Some("5".to_string()));
        assert_eq!(color_id(Some(json!("11"))).unwrap(), Some("11".to_string()));
        assert_eq!(color_id(None).unwrap(), None);
        assert!(color_id(Some(json!("12"))).is_err());
        assert!(color_id(Some(json!("blue"))).is_err());
    }

    #[test]
    fn test_event_time_converts_to_target_zone() {
        let utc = parse_timestamp("2024-10-18T14:00:00Z", chrono_tz::UTC).unwrap();
        let local = event_time(&utc, chrono_tz::America::New_York);
        assert_eq!(local.date_time.as_deref(), Some("2024-10-18T10:00:00"));
        assert_eq!(local.time_zone.as_deref(), Some("America/New_York"));
    }
}
