//! Google Calendar API v3 backend

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::backend::{CalendarBackend, CalendarError};
use super::types::{Event, ListFilters};
use crate::auth::TokenManager;
use crate::constants::calendar::GOOGLE_CALENDAR_API_BASE;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Upper bound on `events.list` pages followed for one listing
const MAX_LIST_PAGES: usize = 10;

pub struct GoogleCalendar {
    http: Client,
    tokens: Arc<TokenManager>,
    calendar_id: String,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventList {
    #[serde(default)]
    items: Vec<Event>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl GoogleCalendar {
    pub fn new(
        tokens: Arc<TokenManager>,
        calendar_id: impl Into<String>,
    ) -> Result<Self, CalendarError> {
        Ok(Self {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            tokens,
            calendar_id: calendar_id.into(),
            base_url: GOOGLE_CALENDAR_API_BASE.to_string(),
        })
    }

    /// Point at a different API root (test servers, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `{base}/calendars/{calendarId}/events[/{eventId}]` with each
    /// segment percent-encoded
    pub fn events_url(&self, event_id: Option<&str>) -> Result<Url, CalendarError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CalendarError::Invalid(format!("bad calendar API base URL: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| {
                    CalendarError::Invalid("calendar API base URL cannot be a base".into())
                })?;
            segments.pop_if_empty().push("calendars").push(&self.calendar_id).push("events");
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&Event>,
    ) -> Result<reqwest::Response, CalendarError> {
        let token = self.tokens.access_token().await?;
        debug!(%method, %url, "Calendar request");
        let mut request = self.http.request(method, url).bearer_auth(token).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&Event>,
    ) -> Result<T, CalendarError> {
        Ok(self.send(method, url, query, body).await?.json().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);
    warn!(status = status.as_u16(), path = %url, "Calendar API error: {}", message);

    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Err(CalendarError::NotFound(message));
    }
    Err(CalendarError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl CalendarBackend for GoogleCalendar {
    /// Follows `nextPageToken` until the listing ends, `maxResults` events
    /// are collected, or [`MAX_LIST_PAGES`] pages have been read.
    async fn list(&self, filters: &ListFilters) -> Result<Vec<Event>, CalendarError> {
        let url = self.events_url(None)?;
        let limit = filters.max_results.map(|n| n as usize);
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 1..=MAX_LIST_PAGES {
            let mut query = filters.to_query();
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }
            let list: EventList = self.send_json(Method::GET, url.clone(), &query, None).await?;
            events.extend(list.items);

            if limit.is_some_and(|limit| events.len() >= limit) {
                break;
            }
            match list.next_page_token {
                Some(token) if page < MAX_LIST_PAGES => page_token = Some(token),
                Some(_) => {
                    warn!(
                        events = events.len(),
                        "Event listing truncated after {MAX_LIST_PAGES} pages"
                    );
                    break;
                }
                None => break,
            }
        }

        if let Some(limit) = limit {
            events.truncate(limit);
        }
        Ok(events)
    }

    async fn get(&self, id: &str) -> Result<Event, CalendarError> {
        self.send_json(Method::GET, self.events_url(Some(id))?, &[], None)
            .await
    }

    async fn insert(&self, event: &Event) -> Result<Event, CalendarError> {
        self.send_json(Method::POST, self.events_url(None)?, &[], Some(event))
            .await
    }

    async fn update(&self, id: &str, event: &Event) -> Result<Event, CalendarError> {
        self.send_json(Method::PUT, self.events_url(Some(id))?, &[], Some(event))
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), CalendarError> {
        self.send(Method::DELETE, self.events_url(Some(id))?, &[], None)
            .await?;
        Ok(())
    }
}
