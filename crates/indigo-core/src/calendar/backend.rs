use async_trait::async_trait;

use super::types::{Event, ListFilters};
use crate::auth::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("calendar request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("calendar API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("event not found: {0}")]
    NotFound(String),
    #[error("invalid event: {0}")]
    Invalid(String),
    #[error("calendar authorization failed: {0}")]
    Auth(#[from] AuthError),
}

impl CalendarError {
    /// Stable code for tool error envelopes
    pub fn code(&self) -> &'static str {
        match self {
            CalendarError::Transport(_) => "calendar_unavailable",
            CalendarError::Api { .. } => "calendar_error",
            CalendarError::NotFound(_) => "not_found",
            CalendarError::Invalid(_) => "invalid_event",
            CalendarError::Auth(_) => "unauthorized",
        }
    }
}

/// A user's calendar
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    async fn list(&self, filters: &ListFilters) -> Result<Vec<Event>, CalendarError>;

    async fn get(&self, id: &str) -> Result<Event, CalendarError>;

    /// Create an event, returning it as stored (with its new id)
    async fn insert(&self, event: &Event) -> Result<Event, CalendarError>;

    /// Replace an event's body
    async fn update(&self, id: &str, event: &Event) -> Result<Event, CalendarError>;

    async fn delete(&self, id: &str) -> Result<(), CalendarError>;
}
