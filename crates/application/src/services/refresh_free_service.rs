//! Refresh-free maintenance job
//!
//! Lists the aggregator's free models, probes each one with a tiny prompt and saves
//! the ones that answered. Progress is streamed through the job's session.

use std::{fmt, sync::Arc, time::Duration};

use domain::{DonePayload, ModelAttempt, SessionId, SseEvent};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::ApplicationError,
    ports::{CredentialPort, FreeModelCatalogPort, FreeModelStorePort, ModelExecutorPort, ModelPrompt},
    services::{
        attempt_planner::{AGGREGATOR_CREDENTIAL, AGGREGATOR_PREFIX},
        session_registry::{PushOutcome, SessionRegistry},
    },
};

const PROBE_PROMPT: &str = "Reply with the single word OK.";

/// Probe settings
#[derive(Debug, Clone)]
pub struct RefreshFreeConfig {
    /// Upper bound on models probed per run
    pub max_candidates: usize,
    /// Per-probe deadline
    pub probe_timeout: Duration,
}

impl Default for RefreshFreeConfig {
    fn default() -> Self {
        Self {
            max_candidates: 12,
            probe_timeout: Duration::from_secs(20),
        }
    }
}

/// Rebuilds the saved free-model list
pub struct RefreshFreeService {
    sessions: Arc<SessionRegistry>,
    catalog: Arc<dyn FreeModelCatalogPort>,
    store: Arc<dyn FreeModelStorePort>,
    executor: Arc<dyn ModelExecutorPort>,
    credentials: Arc<dyn CredentialPort>,
    config: RefreshFreeConfig,
}

impl fmt::Debug for RefreshFreeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshFreeService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RefreshFreeService {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        catalog: Arc<dyn FreeModelCatalogPort>,
        store: Arc<dyn FreeModelStorePort>,
        executor: Arc<dyn ModelExecutorPort>,
        credentials: Arc<dyn CredentialPort>,
        config: RefreshFreeConfig,
    ) -> Self {
        Self {
            sessions,
            catalog,
            store,
            executor,
            credentials,
            config,
        }
    }

    /// Run the job, reporting through `session`
    #[instrument(skip(self), fields(session_id = %session))]
    pub async fn run(&self, session: SessionId) {
        match self.execute(session).await {
            Ok(saved) => info!(saved, "Free model list refreshed"),
            Err(ApplicationError::Cancelled(_)) => debug!("Refresh session abandoned"),
            Err(error) => {
                warn!(error = %error, "Refresh-free failed");
                self.sessions.push(&session, SseEvent::error(error.to_string()));
            },
        }
    }

    fn push(&self, session: &SessionId, event: SseEvent) -> Result<(), ApplicationError> {
        match self.sessions.push(session, event) {
            PushOutcome::Delivered(_) => Ok(()),
            PushOutcome::Rejected => Err(ApplicationError::Cancelled(format!(
                "session {session} is gone"
            ))),
        }
    }

    async fn execute(&self, session: SessionId) -> Result<usize, ApplicationError> {
        if !self.credentials.has(AGGREGATOR_CREDENTIAL) {
            return Err(ApplicationError::MissingCredentials(vec![
                AGGREGATOR_CREDENTIAL.to_string(),
            ]));
        }

        self.push(&session, SseEvent::status("Listing free models…"))?;
        let mut candidates = self.catalog.list_free_models().await?;
        candidates.truncate(self.config.max_candidates);
        if candidates.is_empty() {
            return Err(ApplicationError::ExternalService(
                "The aggregator lists no free models".to_string(),
            ));
        }

        let total = candidates.len();
        let prompt = ModelPrompt {
            system: String::new(),
            user: PROBE_PROMPT.to_string(),
            max_output_tokens: Some(16),
        };

        let mut working = Vec::new();
        for (i, id) in candidates.into_iter().enumerate() {
            let attempt = ModelAttempt::aggregator(
                format!("{AGGREGATOR_PREFIX}{id}"),
                id.clone(),
                AGGREGATOR_CREDENTIAL,
            );
            let verdict = match tokio::time::timeout(
                self.config.probe_timeout,
                self.executor.complete(&attempt, &prompt),
            )
            .await
            {
                Ok(Ok(_)) => {
                    working.push(id.clone());
                    "ok".to_string()
                },
                Ok(Err(error)) => {
                    debug!(model = %id, error = %error, "Probe failed");
                    format!("failed ({error})")
                },
                Err(_) => "timed out".to_string(),
            };
            self.push(
                &session,
                SseEvent::status(format!("[{}/{total}] {id}: {verdict}", i + 1)),
            )?;
        }

        if working.is_empty() {
            return Err(ApplicationError::ExternalService(
                "No free model answered the probe".to_string(),
            ));
        }

        self.store.save(&working).await?;
        self.push(
            &session,
            SseEvent::status(format!("Saved {} working free models", working.len())),
        )?;
        self.push(&session, SseEvent::Done(DonePayload::default()))?;
        Ok(working.len())
    }
}
