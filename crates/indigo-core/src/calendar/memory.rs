//! In-process calendar for offline use and tests

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use tokio::sync::RwLock;

use super::backend::{CalendarBackend, CalendarError};
use super::types::{Event, ListFilters, OrderBy};
use crate::time::parse_timestamp;

/// Events held in memory, filtered the way Calendar API v3 filters them
/// (recurrences are not expanded).
pub struct InMemoryCalendar {
    timezone: Tz,
    events: RwLock<Vec<Event>>,
    next_id: AtomicU64,
}

impl InMemoryCalendar {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            events: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seed with events; any without an id get one assigned
    pub fn with_events(timezone: Tz, events: Vec<Event>) -> Self {
        let mut calendar = Self::new(timezone);
        let seeded = events
            .into_iter()
            .map(|mut event| {
                if event.id.is_none() {
                    event.id = Some(calendar.allocate_id());
                }
                event
            })
            .collect();
        calendar.events = RwLock::new(seeded);
        calendar
    }

    pub async fn snapshot(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }

    fn allocate_id(&self) -> String {
        format!("evt{:04}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn bound(&self, raw: &Option<String>) -> Result<Option<DateTime<Tz>>, CalendarError> {
        raw.as_deref()
            .map(|s| {
                parse_timestamp(s, self.timezone).map_err(|e| CalendarError::Invalid(e.to_string()))
            })
            .transpose()
    }

    fn validate(&self, event: &Event) -> Result<(), CalendarError> {
        let start = event
            .starts_at(self.timezone)
            .ok_or_else(|| CalendarError::Invalid("missing or unreadable start".into()))?;
        let end = event
            .ends_at(self.timezone)
            .ok_or_else(|| CalendarError::Invalid("missing or unreadable end".into()))?;
        if end < start {
            return Err(CalendarError::Invalid("end is before start".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarBackend for InMemoryCalendar {
    async fn list(&self, filters: &ListFilters) -> Result<Vec<Event>, CalendarError> {
        let time_min = self.bound(&filters.time_min)?;
        let time_max = self.bound(&filters.time_max)?;
        let tz = self.timezone;

        let mut matches: Vec<Event> = self
            .events
            .read()
            .await
            .iter()
            .filter(|event| match (time_min, event.ends_at(tz)) {
                (Some(min), Some(end)) => end > min,
                _ => true,
            })
            .filter(|event| match (time_max, event.starts_at(tz)) {
                (Some(max), Some(start)) => start < max,
                _ => true,
            })
            .filter(|event| match &filters.q {
                Some(q) => {
                    let q = q.to_lowercase();
                    [&event.summary, &event.description, &event.location]
                        .iter()
                        .any(|field| {
                            field
                                .as_deref()
                                .is_some_and(|text| text.to_lowercase().contains(&q))
                        })
                }
                None => true,
            })
            .cloned()
            .collect();

        if filters.order_by == Some(OrderBy::StartTime) {
            matches.sort_by_key(|event| event.starts_at(tz));
        }
        if let Some(limit) = filters.max_results {
            matches.truncate(limit as usize);
        }
        Ok(matches)
    }

    async fn get(&self, id: &str) -> Result<Event, CalendarError> {
        self.events
            .read()
            .await
            .iter()
            .find(|event| event.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| CalendarError::NotFound(id.to_string()))
    }

    async fn insert(&self, event: &Event) -> Result<Event, CalendarError> {
        self.validate(event)?;
        let mut stored = event.clone();
        stored.id = Some(self.allocate_id());
        self.events.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: &str, event: &Event) -> Result<Event, CalendarError> {
        self.validate(event)?;
        let mut events = self.events.write().await;
        let slot = events
            .iter_mut()
            .find(|existing| existing.id.as_deref() == Some(id))
            .ok_or_else(|| CalendarError::NotFound(id.to_string()))?;
        let mut stored = event.clone();
        stored.id = Some(id.to_string());
        *slot = stored.clone();
        Ok(stored)
    }

    async fn delete(&self, id: &str) -> Result<(), CalendarError> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|event| event.id.as_deref() != Some(id));
        if events.len() == before {
            return Err(CalendarError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
