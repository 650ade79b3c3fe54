//! Free-model refresh endpoint
//!
//! Only one refresh runs at a time. A request arriving while one is active is
//! answered with the running job's session id.

use std::sync::Arc;

use axum::{Json, extract::State};
use domain::SessionId;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::{
    error::ApiError, handlers::summarize::AcceptedResponse, state::AppState, tasks::supervise,
};

/// Claim the maintenance slot, or return the session already holding it
///
/// The returned flag is `true` when a new session was created and the caller
/// must start the job.
pub fn claim_slot(state: &AppState) -> (SessionId, bool) {
    let mut slot = state.maintenance.lock();
    if let Some(active) = *slot
        && state.sessions.is_done(&active) == Some(false)
    {
        return (active, false);
    }
    let session = state.sessions.create();
    *slot = Some(session);
    (session, true)
}

fn release_slot(slot: &Mutex<Option<SessionId>>, session: SessionId) {
    let mut slot = slot.lock();
    if *slot == Some(session) {
        *slot = None;
    }
}

/// `POST /v1/refresh-free`
#[instrument(skip_all)]
pub async fn refresh_free(State(state): State<AppState>) -> Result<Json<AcceptedResponse>, ApiError> {
    let (session, started) = claim_slot(&state);
    if started {
        info!(session_id = %session, "Refresh-free started");
        let service = Arc::clone(&state.refresh_free);
        let slot = Arc::clone(&state.maintenance);
        let sessions = Arc::clone(&state.sessions);
        tokio::spawn(async move {
            supervise(sessions, session, async move { service.run(session).await }).await;
            release_slot(&slot, session);
            debug!(session_id = %session, "Maintenance slot released");
        });
    } else {
        debug!(session_id = %session, "Refresh-free already running");
    }

    Ok(Json(AcceptedResponse {
        ok: true,
        id: session.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_only_clears_own_session() {
        let first = SessionId::new();
        let second = SessionId::new();
        let slot = Mutex::new(Some(second));
        release_slot(&slot, first);
        assert_eq!(*slot.lock(), Some(second));
        release_slot(&slot, second);
        assert!(slot.lock().is_none());
    }
}
