//! Turn streaming over server-sent events.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};

use indigo_core::Step;

use crate::error::AppError;
use crate::types::StreamQuery;
use crate::AppState;

/// `GET /stream?thread_id=<id>&message=<text>`
///
/// One unnamed event per completed node, carrying the latest message that
/// node produced. The stream closes when the turn ends.
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if query.thread_id.trim().is_empty() {
        return Err(AppError::BadRequest("thread_id must not be empty".into()));
    }

    tracing::info!(thread = %query.thread_id, "Streaming turn");
    let steps = state
        .assistant
        .stream_turn(&query.thread_id, &query.message)
        .await?;

    let events = steps.map(|step| Ok(step_event(&step)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn step_event(step: &Step) -> Event {
    tracing::info!("Update from {} node in {}", step.node, step.namespace_label());
    Event::default().data(sse_data(step.update.latest_content()))
}

/// SSE fields cannot carry carriage returns; line feeds become separate
/// `data:` lines and are rejoined by the client.
fn sse_data(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_data_normalizes_line_endings() {
        assert_eq!(sse_data("a\r\nb\rc\nd"), "a\nb\nc\nd");
        assert_eq!(sse_data(""), "");
    }
}
