//! Session event streams
//!
//! Attaching replays the session's buffered history and then follows it live.
//! The stream ends after the terminal event; a client that disconnects early is
//! detached from the session without affecting the work.

use std::{convert::Infallible, sync::Arc};

use application::SessionRegistry;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use domain::{SessionId, SseEvent};
use futures::{Stream, stream};
use tracing::debug;

use crate::{error::ApiError, state::AppState};

/// Detaches the subscriber when the response stream is dropped
struct DetachGuard {
    sessions: Arc<SessionRegistry>,
    session_id: SessionId,
    subscriber_id: u64,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        self.sessions.detach(&self.session_id, self.subscriber_id);
    }
}

/// Wire form of one session event
pub fn to_sse(event: &SseEvent) -> Event {
    Event::default()
        .event(event.event_name())
        .data(event.data_json())
}

fn parse_id(raw: &str) -> Result<SessionId, ApiError> {
    SessionId::parse(raw).map_err(|_| ApiError::NotFound(format!("session {raw}")))
}

/// Stream a session's events
pub(crate) fn stream_session(
    state: &AppState,
    raw_id: &str,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + use<>>, ApiError> {
    let session_id = parse_id(raw_id)?;
    let subscription = state.sessions.attach(&session_id)?;
    debug!(
        session_id = %session_id,
        replayed = subscription.replayed,
        "Streaming session events"
    );

    let guard = DetachGuard {
        sessions: Arc::clone(&state.sessions),
        session_id,
        subscriber_id: subscription.subscriber_id,
    };
    let stream = stream::unfold((subscription, guard), |(mut subscription, guard)| async move {
        let event = subscription.recv().await?;
        Some((Ok(to_sse(&event)), (subscription, guard)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.keepalive()).text("keep-alive")))
}

/// `GET /v1/summarize/{id}/events`
pub async fn summarize_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    stream_session(&state, &id)
}

/// `GET /v1/refresh-free/{id}/events`
pub async fn refresh_free_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    stream_session(&state, &id)
}
