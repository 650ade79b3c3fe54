//! Finished-session sweeper
//!
//! Sessions are also expired lazily on access; this task bounds memory for
//! sessions nobody looks at again.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use application::SessionRegistry;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Spawn a task that drops finished sessions past their grace window
///
/// Returns a `JoinHandle` that can be used to abort the task when shutting down.
pub fn spawn_session_sweeper(sessions: Arc<SessionRegistry>, interval: Duration) -> JoinHandle<()> {
    info!(interval_ms = interval.as_millis(), "Starting session sweeper");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Don't run immediately on startup
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = sessions.sweep_expired(Instant::now());
            if removed > 0 {
                debug!(removed, remaining = sessions.len(), "Swept expired sessions");
            }
        }
    })
}
