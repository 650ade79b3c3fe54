//! Turns a requested model id into the ordered attempt list

use std::{fmt, sync::Arc};

use domain::{ModelAttempt, ProviderConstraints};
use tracing::debug;

use crate::{error::ApplicationError, ports::FreeModelStorePort};

/// Credential used by every aggregator attempt
pub const AGGREGATOR_CREDENTIAL: &str = "OPENROUTER_API_KEY";

/// Prefix selecting the aggregator explicitly
pub const AGGREGATOR_PREFIX: &str = "openrouter/";

/// Prefix selecting a local CLI tool
pub const LOCAL_PREFIX: &str = "cli/";

/// Model id resolved by the configured auto list
pub const AUTO_MODEL: &str = "auto";

/// Model id resolved by the saved free-model list
pub const FREE_MODEL: &str = "free";

/// Vendor APIs reachable directly: (provider, credential, aggregator namespace)
const PROVIDERS: &[(&str, &str, &str)] = &[
    ("openai", "OPENAI_API_KEY", "openai"),
    ("anthropic", "ANTHROPIC_API_KEY", "anthropic"),
    ("google", "GEMINI_API_KEY", "google"),
    ("xai", "XAI_API_KEY", "x-ai"),
];

/// Credential a direct provider needs, if the provider is known
pub fn provider_credential(provider: &str) -> Option<&'static str> {
    PROVIDERS
        .iter()
        .find(|(name, _, _)| *name == provider)
        .map(|(_, credential, _)| *credential)
}

/// Planner settings
#[derive(Debug, Clone)]
pub struct AttemptPlannerConfig {
    /// Candidates for `auto`, in order
    pub auto: Vec<String>,
    /// Follow each direct attempt with the same model through the aggregator
    pub aggregator_fallback: bool,
    /// Upstream providers the aggregator should prefer
    pub aggregator_provider_order: Vec<String>,
}

impl Default for AttemptPlannerConfig {
    fn default() -> Self {
        Self {
            auto: vec![
                "google/gemini-2.5-flash".to_string(),
                "openai/gpt-5-mini".to_string(),
                "anthropic/claude-sonnet-4-5".to_string(),
            ],
            aggregator_fallback: false,
            aggregator_provider_order: Vec::new(),
        }
    }
}

/// Builds attempt lists for summarize requests
pub struct AttemptPlanner {
    config: AttemptPlannerConfig,
    free_models: Arc<dyn FreeModelStorePort>,
}

impl fmt::Debug for AttemptPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptPlanner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AttemptPlanner {
    pub fn new(config: AttemptPlannerConfig, free_models: Arc<dyn FreeModelStorePort>) -> Self {
        Self {
            config,
            free_models,
        }
    }

    /// Ordered attempts for `requested` (`None` means `auto`)
    pub async fn plan(&self, requested: Option<&str>) -> Result<Vec<ModelAttempt>, ApplicationError> {
        let requested = requested.map(str::trim).filter(|s| !s.is_empty());
        let attempts = match requested {
            None => self.plan_auto()?,
            Some(id) if id.eq_ignore_ascii_case(AUTO_MODEL) => self.plan_auto()?,
            Some(id) if id.eq_ignore_ascii_case(FREE_MODEL) => self.plan_free().await?,
            Some(id) => self.plan_explicit(id)?,
        };
        debug!(
            requested = requested.unwrap_or(AUTO_MODEL),
            attempts = attempts.len(),
            "Attempts planned"
        );
        Ok(attempts)
    }

    fn plan_auto(&self) -> Result<Vec<ModelAttempt>, ApplicationError> {
        let mut attempts = Vec::new();
        for id in &self.config.auto {
            let planned = self.plan_explicit(id).map_err(|e| {
                ApplicationError::Configuration(format!("models.auto entry '{id}': {e}"))
            })?;
            for attempt in planned {
                if !attempts.contains(&attempt) {
                    attempts.push(attempt);
                }
            }
        }
        if attempts.is_empty() {
            return Err(ApplicationError::Configuration(
                "models.auto is empty".to_string(),
            ));
        }
        Ok(attempts)
    }

    async fn plan_free(&self) -> Result<Vec<ModelAttempt>, ApplicationError> {
        let models = self.free_models.load().await?;
        if models.is_empty() {
            return Err(ApplicationError::Configuration(
                "No free models saved yet; run refresh-free first".to_string(),
            ));
        }
        Ok(models
            .iter()
            .map(|id| self.aggregator_attempt(&format!("{AGGREGATOR_PREFIX}{id}"), id))
            .collect())
    }

    fn plan_explicit(&self, id: &str) -> Result<Vec<ModelAttempt>, ApplicationError> {
        if let Some(backend) = id.strip_prefix(AGGREGATOR_PREFIX) {
            if backend.is_empty() {
                return Err(invalid(id));
            }
            return Ok(vec![self.aggregator_attempt(id, backend)]);
        }

        if let Some(rest) = id.strip_prefix(LOCAL_PREFIX) {
            let (tool, model) = match rest.split_once('/') {
                Some((tool, model)) => (tool, Some(model)),
                None => (rest, None),
            };
            if tool.is_empty() || model.is_some_and(str::is_empty) {
                return Err(invalid(id));
            }
            return Ok(vec![ModelAttempt::local_process(id, Some(rest.to_string()))]);
        }

        let Some((provider, model)) = id.split_once('/') else {
            return Err(invalid(id));
        };
        let Some((_, credential, namespace)) = PROVIDERS
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(provider))
        else {
            return Err(ApplicationError::Validation(format!(
                "Unknown model provider '{provider}'"
            )));
        };
        if model.is_empty() {
            return Err(invalid(id));
        }

        let mut attempts = vec![ModelAttempt::direct(id, model, *credential)];
        if self.config.aggregator_fallback {
            attempts.push(self.aggregator_attempt(id, &format!("{namespace}/{model}")));
        }
        Ok(attempts)
    }

    fn aggregator_attempt(&self, user_facing: &str, backend: &str) -> ModelAttempt {
        let attempt = ModelAttempt::aggregator(user_facing, backend, AGGREGATOR_CREDENTIAL);
        if self.config.aggregator_provider_order.is_empty() {
            attempt
        } else {
            attempt.with_constraints(ProviderConstraints {
                order: self.config.aggregator_provider_order.clone(),
                allow_fallbacks: Some(true),
            })
        }
    }
}

fn invalid(id: &str) -> ApplicationError {
    ApplicationError::Validation(format!("Invalid model id '{id}'"))
}
