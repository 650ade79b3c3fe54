//! Application services - Use case implementations

mod attempt_planner;
mod model_runner;
mod prompt;
mod refresh_free_service;
mod session_registry;
mod summarize_service;
#[cfg(test)]
mod test_support;

pub use attempt_planner::{
    AGGREGATOR_CREDENTIAL, AGGREGATOR_PREFIX, AUTO_MODEL, AttemptPlanner, AttemptPlannerConfig,
    FREE_MODEL, LOCAL_PREFIX, provider_credential,
};
pub use model_runner::{AttemptSuccess, ModelAttemptRunner, RunnerState};
pub use prompt::{DEFAULT_MAX_OUTPUT_TOKENS, PromptBuilder, SUMMARY_SYSTEM_PROMPT, SummaryPromptInput};
pub use refresh_free_service::{RefreshFreeConfig, RefreshFreeService};
pub use session_registry::{
    PushOutcome, STALE_SESSION_MESSAGE, SessionInfo, SessionRegistry, SessionRegistryConfig,
    Subscription,
};
pub use summarize_service::{
    SummarizeCacheTtls, SummarizeMode, SummarizeRequest, SummarizeService, truncate_chars,
};
