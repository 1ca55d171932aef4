//! Wall-clock access and timestamp parsing in the user's timezone

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TimeError {
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
    #[error("unparseable timestamp '{0}'")]
    Unparseable(String),
    #[error("'{0}' does not exist in {1} (daylight saving gap)")]
    Nonexistent(String, Tz),
}

/// Source of "now" for prompts and date math.
///
/// Tests pin it with [`Clock::fixed`] so instructions and list windows are
/// deterministic.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    timezone: Tz,
    fixed: Option<DateTime<Utc>>,
}

impl Clock {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            fixed: None,
        }
    }

    pub fn fixed(timezone: Tz, at: DateTime<Utc>) -> Self {
        Self {
            timezone,
            fixed: Some(at),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn now(&self) -> DateTime<Tz> {
        self.fixed
            .unwrap_or_else(Utc::now)
            .with_timezone(&self.timezone)
    }

    /// `now + days`, formatted for the calendar API.
    pub fn days_from_now(&self, days: i64) -> String {
        (self.now() + Duration::days(days)).to_rfc3339()
    }

    /// Human readable "now" for model instructions.
    pub fn describe(&self) -> String {
        let now = self.now();
        format!(
            "{} ({}), timezone {}",
            now.format("%A, %B %-d, %Y %H:%M:%S"),
            now.to_rfc3339(),
            self.timezone.name()
        )
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, TimeError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TimeError::UnknownTimezone(name.to_string()))
}

/// Parse a timestamp the way models tend to write them.
///
/// RFC 3339 strings keep their offset. Naive date-times (with or without
/// seconds) and bare dates are read as wall-clock time in `tz`.
pub fn parse_timestamp(raw: &str, tz: Tz) -> Result<DateTime<Tz>, TimeError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&tz));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| TimeError::Unparseable(raw.to_string()))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| TimeError::Nonexistent(raw.to_string(), tz))
}

/// Wall-clock form (`2024-10-18T10:00:00`) paired with a `timeZone` field.
pub fn wall_clock(dt: &DateTime<Tz>) -> String {
    dt.naive_local().format("%Y-%m-%dT%H:%M:%S").to_string()
}
