//! Transport-dispatching model executor
//!
//! Routes each [`ModelAttempt`] to the client for its transport: an
//! OpenAI-compatible endpoint per direct provider, the aggregator endpoint, or a
//! local CLI tool. Opening a stream is retried with backoff; once output flows,
//! failures propagate to the attempt runner.

use std::{collections::HashMap, sync::Arc};

use ai_core::{
    ChatRequest, InferenceError, LocalProcessClient, LocalToolConfig, OpenAiCompatClient,
    OpenAiCompatConfig, StreamingResponse,
};
use application::{
    error::ApplicationError,
    ports::{CredentialPort, ModelExecutorPort, ModelPrompt, OutputStream},
};
use async_trait::async_trait;
use domain::{ModelAttempt, Transport};
use futures::{StreamExt, future};
use tracing::{debug, info, instrument};

use crate::{
    config::AppConfig,
    retry::{RetryConfig, retry},
};

/// Header the aggregator uses to attribute traffic
const AGGREGATOR_TITLE_HEADER: &str = "X-Title";

/// Map a transport error into the application's error vocabulary
pub fn map_inference_error(e: InferenceError) -> ApplicationError {
    match e {
        InferenceError::Unauthorized(msg) => {
            ApplicationError::InvalidRequest(format!("credential rejected: {msg}"))
        },
        InferenceError::RateLimited(msg) => ApplicationError::RateLimited(msg),
        InferenceError::ServerError(msg) => ApplicationError::ExternalService(msg),
        InferenceError::ConnectionFailed(msg) => {
            ApplicationError::ExternalService(format!("connection failed: {msg}"))
        },
        InferenceError::Timeout(ms) => ApplicationError::Timeout(format!("no answer after {ms}ms")),
        InferenceError::InvalidRequest(msg) | InferenceError::RequestFailed(msg) => {
            ApplicationError::InvalidRequest(msg)
        },
        InferenceError::EmptyOutput(model) => ApplicationError::EmptyOutput(model),
        InferenceError::SpawnFailed(msg) => ApplicationError::Configuration(format!(
            "local tool could not start: {msg}"
        )),
        other @ (InferenceError::InvalidResponse(_)
        | InferenceError::StreamError(_)
        | InferenceError::ProcessFailed(_)) => ApplicationError::Inference(other.to_string()),
    }
}

fn into_output(stream: StreamingResponse) -> OutputStream {
    Box::pin(stream.filter_map(|item| {
        future::ready(match item {
            Ok(chunk) if chunk.content.is_empty() => None,
            Ok(chunk) => Some(Ok(chunk.content)),
            Err(e) => Some(Err(map_inference_error(e))),
        })
    }))
}

/// Executes attempts over HTTP endpoints and local processes
pub struct TransportModelExecutor {
    direct: HashMap<String, OpenAiCompatClient>,
    aggregator: Option<OpenAiCompatClient>,
    tools: HashMap<String, LocalProcessClient>,
    credentials: Arc<dyn CredentialPort>,
    retry: RetryConfig,
}

impl std::fmt::Debug for TransportModelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<_> = self.direct.keys().collect();
        providers.sort();
        let mut tools: Vec<_> = self.tools.keys().collect();
        tools.sort();
        f.debug_struct("TransportModelExecutor")
            .field("providers", &providers)
            .field("aggregator", &self.aggregator.as_ref().map(OpenAiCompatClient::base_url))
            .field("tools", &tools)
            .field("retry", &self.retry)
            .finish()
    }
}

impl TransportModelExecutor {
    /// Executor without any endpoint; add them with the `with_*` methods
    pub fn new(credentials: Arc<dyn CredentialPort>, retry: RetryConfig) -> Self {
        Self {
            direct: HashMap::new(),
            aggregator: None,
            tools: HashMap::new(),
            credentials,
            retry,
        }
    }

    /// Build every endpoint and tool named in `config`
    pub fn from_config(
        config: &AppConfig,
        credentials: Arc<dyn CredentialPort>,
    ) -> Result<Self, ApplicationError> {
        let models = &config.models;
        let mut executor = Self::new(credentials, config.retry.clone());

        for provider in ["openai", "anthropic", "google", "xai"] {
            if let Some(url) = models.providers.for_provider(provider) {
                executor = executor.with_direct(provider, models.endpoint(url))?;
            }
        }

        let mut aggregator = models.endpoint(&models.providers.openrouter);
        aggregator.extra_headers.insert(
            AGGREGATOR_TITLE_HEADER.to_string(),
            "summarize-daemon".to_string(),
        );
        executor = executor.with_aggregator(aggregator)?;

        for (name, tool) in config.cli_tools() {
            executor = executor.with_tool(name, tool);
        }

        info!(
            providers = executor.direct.len(),
            tools = executor.tools.len(),
            "Model executor ready"
        );
        Ok(executor)
    }

    /// Register a direct provider endpoint
    pub fn with_direct(
        mut self,
        provider: &str,
        config: OpenAiCompatConfig,
    ) -> Result<Self, ApplicationError> {
        let client = OpenAiCompatClient::new(config).map_err(map_inference_error)?;
        self.direct.insert(provider.to_ascii_lowercase(), client);
        Ok(self)
    }

    /// Register the aggregator endpoint
    pub fn with_aggregator(mut self, config: OpenAiCompatConfig) -> Result<Self, ApplicationError> {
        self.aggregator = Some(OpenAiCompatClient::new(config).map_err(map_inference_error)?);
        Ok(self)
    }

    /// Register a local CLI tool under `cli/<name>`
    #[must_use]
    pub fn with_tool(mut self, name: impl Into<String>, config: LocalToolConfig) -> Self {
        let name = name.into();
        self.tools
            .insert(name.clone(), LocalProcessClient::new(name, config));
        self
    }

    fn credential(&self, attempt: &ModelAttempt) -> Result<String, ApplicationError> {
        match &attempt.required_credential {
            Some(name) => self
                .credentials
                .get(name)
                .ok_or_else(|| ApplicationError::MissingCredential(name.clone())),
            None => Err(ApplicationError::Configuration(format!(
                "{} has no credential configured",
                attempt.user_facing_model_id
            ))),
        }
    }

    fn direct_client(&self, attempt: &ModelAttempt) -> Result<&OpenAiCompatClient, ApplicationError> {
        let provider = attempt
            .user_facing_model_id
            .split_once('/')
            .map(|(provider, _)| provider.to_ascii_lowercase())
            .unwrap_or_default();
        self.direct.get(&provider).ok_or_else(|| {
            ApplicationError::Configuration(format!("no endpoint for provider '{provider}'"))
        })
    }

    async fn open_chat(
        &self,
        client: &OpenAiCompatClient,
        attempt: &ModelAttempt,
        prompt: &ModelPrompt,
    ) -> Result<OutputStream, ApplicationError> {
        let key = self.credential(attempt)?;
        let request = ChatRequest::streaming(attempt.backend_model(), &prompt.system, &*prompt.user)
            .with_max_tokens(prompt.max_output_tokens)
            .with_provider(attempt.provider_constraints.clone());

        let (key, request) = (key.as_str(), &request);
        let stream = retry(&self.retry, move || async move {
            client
                .stream_chat(key, request)
                .await
                .map_err(map_inference_error)
        })
        .await?;
        Ok(into_output(stream))
    }

    async fn open_local(
        &self,
        attempt: &ModelAttempt,
        prompt: &ModelPrompt,
    ) -> Result<OutputStream, ApplicationError> {
        let target = attempt.backend_model();
        let (tool, model) = match target.split_once('/') {
            Some((tool, model)) if !model.is_empty() => (tool, Some(model)),
            Some((tool, _)) => (tool, None),
            None => (target, None),
        };
        let client = self.tools.get(tool).ok_or_else(|| {
            ApplicationError::Configuration(format!("local tool '{tool}' is not configured"))
        })?;
        let stream = client
            .stream(&prompt.flattened(), model)
            .await
            .map_err(map_inference_error)?;
        Ok(into_output(stream))
    }
}

#[async_trait]
impl ModelExecutorPort for TransportModelExecutor {
    #[instrument(skip(self, prompt), fields(model = %attempt.user_facing_model_id, transport = %attempt.transport))]
    async fn open_stream(
        &self,
        attempt: &ModelAttempt,
        prompt: &ModelPrompt,
    ) -> Result<OutputStream, ApplicationError> {
        debug!("Opening model stream");
        match attempt.transport {
            Transport::DirectProviderApi => {
                let client = self.direct_client(attempt)?;
                self.open_chat(client, attempt, prompt).await
            },
            Transport::AggregatorApi => {
                let client = self.aggregator.as_ref().ok_or_else(|| {
                    ApplicationError::Configuration("aggregator endpoint not configured".to_string())
                })?;
                self.open_chat(client, attempt, prompt).await
            },
            Transport::LocalProcess => self.open_local(attempt, prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::EnvCredentials;

    fn prompt() -> ModelPrompt {
        ModelPrompt {
            system: "sys".to_string(),
            user: "user".to_string(),
            max_output_tokens: Some(64),
        }
    }

    fn no_credentials() -> Arc<dyn CredentialPort> {
        Arc::new(EnvCredentials::from_values(Vec::<(String, String)>::new()))
    }

    #[test]
    fn maps_errors_into_runner_classes() {
        use application::FailureClass;

        let transient = [
            InferenceError::RateLimited("slow".into()),
            InferenceError::Timeout(10),
            InferenceError::EmptyOutput("m".into()),
            InferenceError::StreamError("cut".into()),
            InferenceError::ServerError("502".into()),
        ];
        for err in transient {
            assert_eq!(map_inference_error(err).failure_class(), FailureClass::Transient);
        }
        assert_eq!(
            map_inference_error(InferenceError::Unauthorized("no".into())).failure_class(),
            FailureClass::Fatal
        );
        assert!(matches!(
            map_inference_error(InferenceError::SpawnFailed("x".into())),
            ApplicationError::Configuration(_)
        ));
    }

    #[tokio::test]
    async fn missing_credential_is_reported_by_name() {
        let executor = TransportModelExecutor::new(no_credentials(), RetryConfig::none())
            .with_direct("openai", OpenAiCompatConfig::new("http://127.0.0.1:9/v1"))
            .unwrap();
        let attempt = ModelAttempt::direct("openai/gpt-5-mini", "gpt-5-mini", "OPENAI_API_KEY");
        assert!(matches!(
            executor.open_stream(&attempt, &prompt()).await,
            Err(ApplicationError::MissingCredential(name)) if name == "OPENAI_API_KEY"
        ));
    }

    #[tokio::test]
    async fn unknown_provider_is_configuration_error() {
        let executor = TransportModelExecutor::new(no_credentials(), RetryConfig::none());
        let attempt = ModelAttempt::direct("mistral/large", "large", "MISTRAL_API_KEY");
        assert!(matches!(
            executor.open_stream(&attempt, &prompt()).await,
            Err(ApplicationError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn unknown_local_tool_is_configuration_error() {
        let executor = TransportModelExecutor::new(no_credentials(), RetryConfig::none());
        let attempt = ModelAttempt::local_process("cli/nope", Some("nope".to_string()));
        assert!(matches!(
            executor.open_stream(&attempt, &prompt()).await,
            Err(ApplicationError::Configuration(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn local_tool_receives_flattened_prompt() {
        let mut tool = LocalToolConfig::new("cat");
        tool.idle_timeout_ms = 5_000;
        let executor =
            TransportModelExecutor::new(no_credentials(), RetryConfig::none()).with_tool("cat", tool);
        let attempt = ModelAttempt::local_process("cli/cat", Some("cat".to_string()));
        let output = executor.complete(&attempt, &prompt()).await.unwrap();
        assert_eq!(output, "sys\n\nuser");
    }

    #[test]
    fn from_config_registers_everything() {
        let executor =
            TransportModelExecutor::from_config(&AppConfig::default(), no_credentials()).unwrap();
        assert_eq!(executor.direct.len(), 4);
        assert!(executor.aggregator.is_some());
        assert!(executor.tools.contains_key("claude"));
    }
}
