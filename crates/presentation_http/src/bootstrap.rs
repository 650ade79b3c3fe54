//! Service wiring
//!
//! Builds the adapters from configuration and assembles them into the shared
//! state. Tests swap in their own [`Ports`] and reuse [`build_state`].

use std::{fmt, sync::Arc};

use application::{
    ApplicationError, AttemptPlanner, CachePort, ContentExtractorPort, CredentialPort,
    FreeModelCatalogPort, FreeModelStorePort, ModelAttemptRunner, ModelExecutorPort, PromptBuilder,
    RefreshFreeService, SessionRegistry, SummarizeCacheTtls, SummarizeService,
};
use domain::CacheKind;
use infrastructure::{
    AggregatorFreeCatalog, AppConfig, DisabledCache, EnvCredentials, HttpContentExtractor,
    JsonFreeModelStore, SqliteCacheStore, TransportModelExecutor,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::state::AppState;

/// Startup failures
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Failed to build {component}: {source}")]
    Adapter {
        component: &'static str,
        #[source]
        source: ApplicationError,
    },
}

/// Every outward-facing dependency of the services
pub struct Ports {
    pub cache: Arc<dyn CachePort>,
    pub extractor: Arc<dyn ContentExtractorPort>,
    pub executor: Arc<dyn ModelExecutorPort>,
    pub credentials: Arc<dyn CredentialPort>,
    pub catalog: Arc<dyn FreeModelCatalogPort>,
    pub free_models: Arc<dyn FreeModelStorePort>,
}

impl fmt::Debug for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ports")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Ports {
    /// Production adapters
    ///
    /// A cache that cannot be opened is replaced by a disabled one; the daemon
    /// works without it.
    pub fn from_config(config: &AppConfig) -> Result<Self, BootstrapError> {
        let credentials: Arc<dyn CredentialPort> = Arc::new(EnvCredentials::new());

        let cache: Arc<dyn CachePort> = if config.cache.enabled {
            match SqliteCacheStore::open(&config.cache) {
                Ok(store) => {
                    info!(path = %config.cache.resolved_path().display(), "Cache opened");
                    Arc::new(store)
                },
                Err(e) => {
                    warn!(error = %e, "Cache unavailable, continuing without it");
                    Arc::new(DisabledCache::new())
                },
            }
        } else {
            info!("Cache disabled by configuration");
            Arc::new(DisabledCache::new())
        };

        let extractor = HttpContentExtractor::new(&config.extract).map_err(|source| {
            BootstrapError::Adapter {
                component: "content extractor",
                source,
            }
        })?;
        let executor = TransportModelExecutor::from_config(config, Arc::clone(&credentials))
            .map_err(|source| BootstrapError::Adapter {
                component: "model executor",
                source,
            })?;
        let catalog = AggregatorFreeCatalog::new(
            config.models.endpoint(&config.models.providers.openrouter),
            Arc::clone(&credentials),
        )
        .map_err(|source| BootstrapError::Adapter {
            component: "free-model catalog",
            source,
        })?;
        let free_models = JsonFreeModelStore::new(config.refresh_free.resolved_store_path());

        Ok(Self {
            cache,
            extractor: Arc::new(extractor),
            executor: Arc::new(executor),
            credentials,
            catalog: Arc::new(catalog),
            free_models: Arc::new(free_models),
        })
    }
}

/// Assemble the registry and services around `ports`
pub fn build_state(config: Arc<AppConfig>, ports: Ports) -> AppState {
    let sessions = Arc::new(SessionRegistry::new(config.sessions.registry_config()));

    let summarize = SummarizeService::new(
        Arc::clone(&sessions),
        Arc::clone(&ports.cache),
        ports.extractor,
        Arc::clone(&ports.executor),
        ModelAttemptRunner::new(Arc::clone(&ports.credentials)),
        AttemptPlanner::new(config.models.planner_config(), Arc::clone(&ports.free_models)),
        PromptBuilder::new(config.models.max_output_tokens),
        SummarizeCacheTtls {
            extract: config.cache.ttl(CacheKind::Extract),
            summary: config.cache.ttl(CacheKind::Summary),
        },
    );

    let refresh_free = RefreshFreeService::new(
        Arc::clone(&sessions),
        ports.catalog,
        ports.free_models,
        ports.executor,
        ports.credentials,
        config.refresh_free.service_config(),
    );

    AppState::new(
        sessions,
        Arc::new(summarize),
        Arc::new(refresh_free),
        ports.cache,
        config,
    )
}
