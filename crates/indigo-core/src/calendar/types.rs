use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::calendar::BOOKKEEPING_FIELDS;
use crate::time::{parse_timestamp, parse_timezone};

/// Start or end of an event. Timed events carry `dateTime`, all-day
/// events carry `date`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn timed(date_time: impl Into<String>, time_zone: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            date: None,
            time_zone: Some(time_zone.into()),
        }
    }

    /// Absolute instant, reading wall-clock values in the event's own
    /// timezone (falling back to `default_tz`).
    pub fn resolve(&self, default_tz: Tz) -> Option<DateTime<Tz>> {
        let tz = self
            .time_zone
            .as_deref()
            .and_then(|name| parse_timezone(name).ok())
            .unwrap_or(default_tz);
        let raw = self.date_time.as_deref().or(self.date.as_deref())?;
        parse_timestamp(raw, tz).ok()
    }
}

/// A calendar event.
///
/// Fields the assistant does not model are kept in `extra` so a
/// read-modify-write cycle never drops them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurrence: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    pub fn starts_at(&self, default_tz: Tz) -> Option<DateTime<Tz>> {
        self.start.as_ref().and_then(|s| s.resolve(default_tz))
    }

    pub fn ends_at(&self, default_tz: Tz) -> Option<DateTime<Tz>> {
        self.end.as_ref().and_then(|e| e.resolve(default_tz))
    }

    /// JSON form with bookkeeping fields removed, as shown to models
    pub fn pruned(&self) -> Value {
        prune_event(serde_json::to_value(self).unwrap_or(Value::Null))
    }
}

/// Remove bookkeeping fields from an event object
pub fn prune_event(mut event: Value) -> Value {
    if let Value::Object(map) = &mut event {
        for field in BOOKKEEPING_FIELDS {
            map.remove(*field);
        }
    }
    event
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OrderBy {
    /// Only valid together with `singleEvents = true`
    StartTime,
    Updated,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::StartTime => "startTime",
            OrderBy::Updated => "updated",
        }
    }
}

/// Query for listing events (Calendar API v3 `events.list` parameters)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListFilters {
    /// Lower bound (exclusive) for an event's end time, RFC 3339 with offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_min: Option<String>,
    /// Upper bound (exclusive) for an event's start time, RFC 3339 with offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_max: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    /// Expand recurring events into instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_events: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_min: Option<String>,
    /// Free-text search across summary, description, location and attendees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

impl ListFilters {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                query.push((key, value));
            }
        };
        push("timeMin", self.time_min.clone());
        push("timeMax", self.time_max.clone());
        push("maxResults", self.max_results.map(|n| n.to_string()));
        push("orderBy", self.order_by.map(|o| o.as_str().to_string()));
        push("singleEvents", self.single_events.map(|b| b.to_string()));
        push("timeZone", self.time_zone.clone());
        push("showDeleted", self.show_deleted.map(|b| b.to_string()));
        push("updatedMin", self.updated_min.clone());
        push("q", self.q.clone());
        query
    }
}
