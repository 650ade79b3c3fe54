//! Application state shared across handlers

use std::{sync::Arc, time::Duration};

use application::{CachePort, RefreshFreeService, SessionRegistry, SummarizeService};
use domain::SessionId;
use infrastructure::AppConfig;
use parking_lot::Mutex;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Live sessions and their replay buffers
    pub sessions: Arc<SessionRegistry>,
    /// Summarize use case
    pub summarize: Arc<SummarizeService>,
    /// Free-model refresh job
    pub refresh_free: Arc<RefreshFreeService>,
    /// Cache shared by the services, closed on shutdown
    pub cache: Arc<dyn CachePort>,
    /// Session of the maintenance job currently running, if any
    pub maintenance: Arc<Mutex<Option<SessionId>>>,
    /// Application configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        summarize: Arc<SummarizeService>,
        refresh_free: Arc<RefreshFreeService>,
        cache: Arc<dyn CachePort>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            sessions,
            summarize,
            refresh_free,
            cache,
            maintenance: Arc::new(Mutex::new(None)),
            config,
        }
    }

    /// Interval between SSE keep-alive comments
    pub fn keepalive(&self) -> Duration {
        self.config.sessions.keepalive()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.sessions.len())
            .field("maintenance", &*self.maintenance.lock())
            .finish_non_exhaustive()
    }
}
