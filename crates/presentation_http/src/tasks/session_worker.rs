//! Supervised session workers
//!
//! A worker that panics or is aborted never pushes its own terminal event. The
//! supervisor closes the session with an `error` in that case, so subscribers are
//! released and the session is swept like any finished one.

use std::{future::Future, sync::Arc};

use application::SessionRegistry;
use domain::{SessionId, SseEvent};
use tracing::{debug, error};

/// Message pushed when a worker dies without finishing its session
pub const WORKER_FAILED_MESSAGE: &str = "Internal error while processing the request";

/// Run `work` as its own task and wait for it
///
/// Returns once the worker has ended, whether it finished, panicked or was aborted.
pub async fn supervise<F>(sessions: Arc<SessionRegistry>, session: SessionId, work: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let Err(join_error) = tokio::spawn(work).await else {
        return;
    };

    if join_error.is_panic() {
        error!(session_id = %session, "Session worker panicked");
    } else {
        error!(session_id = %session, error = %join_error, "Session worker stopped");
    }
    let outcome = sessions.push(&session, SseEvent::error(WORKER_FAILED_MESSAGE));
    debug!(session_id = %session, ?outcome, "Worker failure reported");
}
