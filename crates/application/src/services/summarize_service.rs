//! Summarize use case
//!
//! Planning happens before a session exists so that bad requests are rejected
//! synchronously. Everything after that runs in a worker and reports through the
//! session: progress as `status`, output as `chunk`, and exactly one terminal event.

use std::{
    fmt,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use domain::{
    CacheKind, ContentFingerprint, DonePayload, MetaPayload, MetricsPayload, ModelAttempt,
    SessionId, SseEvent, SummaryLength,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::ApplicationError,
    ports::{
        CachePort, CachePortExt, ContentExtractorPort, ExtractedContent, ModelExecutorPort,
        ModelPrompt, OutputStream,
    },
    services::{
        attempt_planner::{AUTO_MODEL, AttemptPlanner},
        model_runner::ModelAttemptRunner,
        prompt::{PromptBuilder, SummaryPromptInput},
        session_registry::{PushOutcome, SessionRegistry},
    },
};

/// Where the text to summarize comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizeMode {
    /// Use supplied page text when present, otherwise fetch the URL
    #[default]
    Auto,
    /// Use the supplied page text
    Page,
    /// Always fetch the URL
    Url,
}

impl FromStr for SummarizeMode {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "page" => Ok(Self::Page),
            "url" => Ok(Self::Url),
            other => Err(ApplicationError::Validation(format!(
                "mode must be one of auto, page, url (got '{other}')"
            ))),
        }
    }
}

/// A validated summarize request
#[derive(Debug, Clone, Default)]
pub struct SummarizeRequest {
    pub url: String,
    pub title: Option<String>,
    pub text: Option<String>,
    /// The client already cut the supplied text
    pub truncated: bool,
    pub model: Option<String>,
    pub length: SummaryLength,
    pub language: Option<String>,
    pub mode: SummarizeMode,
    pub no_cache: bool,
    pub max_characters: Option<usize>,
}

/// Cache lifetimes used by the flow; `None` never expires
#[derive(Debug, Clone, Default)]
pub struct SummarizeCacheTtls {
    pub extract: Option<Duration>,
    pub summary: Option<Duration>,
}

/// Summary as stored in the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CachedSummary {
    model: String,
    text: String,
}

/// Cut `text` to at most `max` characters on a char boundary
pub fn truncate_chars(text: &str, max: Option<usize>) -> (String, bool) {
    match max {
        Some(max) => match text.char_indices().nth(max) {
            Some((cut, _)) => (text[..cut].to_string(), true),
            None => (text.to_string(), false),
        },
        None => (text.to_string(), false),
    }
}

/// Orchestrates extraction, caching, attempts and streaming for one request
pub struct SummarizeService {
    sessions: Arc<SessionRegistry>,
    cache: Arc<dyn CachePort>,
    extractor: Arc<dyn ContentExtractorPort>,
    executor: Arc<dyn ModelExecutorPort>,
    runner: ModelAttemptRunner,
    planner: AttemptPlanner,
    prompts: PromptBuilder,
    ttls: SummarizeCacheTtls,
}

impl fmt::Debug for SummarizeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummarizeService")
            .field("planner", &self.planner)
            .field("prompts", &self.prompts)
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}

impl SummarizeService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionRegistry>,
        cache: Arc<dyn CachePort>,
        extractor: Arc<dyn ContentExtractorPort>,
        executor: Arc<dyn ModelExecutorPort>,
        runner: ModelAttemptRunner,
        planner: AttemptPlanner,
        prompts: PromptBuilder,
        ttls: SummarizeCacheTtls,
    ) -> Self {
        Self {
            sessions,
            cache,
            extractor,
            executor,
            runner,
            planner,
            prompts,
            ttls,
        }
    }

    /// Resolve the requested model into attempts; errors are client errors
    pub async fn plan(&self, model: Option<&str>) -> Result<Vec<ModelAttempt>, ApplicationError> {
        self.planner.plan(model).await
    }

    /// Run the request to completion, reporting through `session`
    #[instrument(skip(self, request, attempts), fields(session_id = %session, url = %request.url))]
    pub async fn run(&self, session: SessionId, request: SummarizeRequest, attempts: Vec<ModelAttempt>) {
        if let Err(error) = self.execute(session, &request, &attempts).await {
            match error {
                ApplicationError::Cancelled(_) => {
                    debug!("Session abandoned, stopping work");
                },
                error => {
                    warn!(error = %error, "Summarize failed");
                    self.sessions.push(&session, SseEvent::error(error.to_string()));
                },
            }
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

    async fn execute(
        &self,
        session: SessionId,
        request: &SummarizeRequest,
        attempts: &[ModelAttempt],
    ) -> Result<(), ApplicationError> {
        let started = Instant::now();

        let content = self.source_content(request).await?;
        let (text, cut) = truncate_chars(&content.text, request.max_characters);
        if text.trim().is_empty() {
            return Err(ApplicationError::Validation(format!(
                "No text to summarize at {}",
                request.url
            )));
        }
        let truncated = request.truncated || cut;
        let input_chars = text.chars().count();
        let title = request.title.clone().or_else(|| content.title.clone());

        let requested_model = request.model.as_deref().unwrap_or(AUTO_MODEL);
        let key = ContentFingerprint::builder(&text)
            .param("kind", CacheKind::Summary.as_str())
            .param("model", requested_model)
            .param("length", request.length.to_string())
            .opt_param("language", request.language.as_deref())
            .param("template", PromptBuilder::template_hash())
            .finish();

        if !request.no_cache
            && let Some(cached) = self
                .cache
                .get_json::<CachedSummary>(CacheKind::Summary, &key)
                .await
        {
            info!(model = %cached.model, "Serving summary from cache");
            let output_chars = cached.text.chars().count();
            self.push(
                &session,
                SseEvent::Meta(MetaPayload {
                    model: Some(cached.model.clone()),
                    title,
                    input_chars,
                    truncated,
                    cached: true,
                }),
            )?;
            self.push(&session, SseEvent::chunk(cached.text))?;
            self.push(
                &session,
                SseEvent::Metrics(MetricsPayload {
                    elapsed_ms: elapsed_ms(started),
                    model: Some(cached.model.clone()),
                    input_chars,
                    output_chars,
                    attempts: 0,
                }),
            )?;
            self.push(
                &session,
                SseEvent::Done(DonePayload {
                    model: Some(cached.model),
                    cached: true,
                }),
            )?;
            return Ok(());
        }

        let meta = MetaPayload {
            model: None,
            title: title.clone(),
            input_chars,
            truncated,
            cached: false,
        };
        self.push(&session, SseEvent::Meta(meta.clone()))?;

        let prompt = self.prompts.build(&SummaryPromptInput {
            url: &request.url,
            title: title.as_deref(),
            text: &text,
            length: request.length,
            language: request.language.as_deref(),
            truncated,
        });

        let success = self
            .runner
            .run(attempts, |attempt| {
                let sessions = Arc::clone(&self.sessions);
                let executor = Arc::clone(&self.executor);
                let prompt = prompt.clone();
                async move {
                    let status = SseEvent::status(format!("Trying {}…", attempt.user_facing_model_id));
                    if sessions.push(&session, status).is_rejected() {
                        return Err(ApplicationError::Cancelled(format!(
                            "session {session} is gone"
                        )));
                    }
                    open_with_first_chunk(executor.as_ref(), &attempt, &prompt).await
                }
            })
            .await?;

        let model = success.attempt.user_facing_model_id.clone();
        let (first, mut stream) = success.value;
        self.push(
            &session,
            SseEvent::Meta(MetaPayload {
                model: Some(model.clone()),
                ..meta
            }),
        )?;

        let mut output = first;
        self.push(&session, SseEvent::chunk(output.clone()))?;
        while let Some(piece) = stream.next().await {
            let piece = piece?;
            if piece.is_empty() {
                continue;
            }
            output.push_str(&piece);
            self.push(&session, SseEvent::chunk(piece))?;
        }

        self.push(
            &session,
            SseEvent::Metrics(MetricsPayload {
                elapsed_ms: elapsed_ms(started),
                model: Some(model.clone()),
                input_chars,
                output_chars: output.chars().count(),
                attempts: success.tried,
            }),
        )?;

        // Stored before `done` so a client repeating the request right away hits it
        if !output.trim().is_empty() {
            self.cache
                .set_json(
                    CacheKind::Summary,
                    &key,
                    &CachedSummary {
                        model: model.clone(),
                        text: output,
                    },
                    self.ttls.summary,
                )
                .await;
        }
        self.push(
            &session,
            SseEvent::Done(DonePayload {
                model: Some(model),
                cached: false,
            }),
        )?;
        Ok(())
    }

    /// Supplied page text or extracted URL content
    async fn source_content(
        &self,
        request: &SummarizeRequest,
    ) -> Result<ExtractedContent, ApplicationError> {
        let supplied = request.text.as_ref().filter(|t| !t.trim().is_empty());
        match (request.mode, supplied) {
            (SummarizeMode::Page | SummarizeMode::Auto, Some(text)) => Ok(ExtractedContent {
                url: request.url.clone(),
                title: request.title.clone(),
                text: text.clone(),
            }),
            (SummarizeMode::Page, None) => Err(ApplicationError::Validation(
                "mode 'page' requires text".to_string(),
            )),
            (SummarizeMode::Auto | SummarizeMode::Url, _) => self.extract_cached(&request.url).await,
        }
    }

    async fn extract_cached(&self, url: &str) -> Result<ExtractedContent, ApplicationError> {
        let key = ContentFingerprint::builder(url)
            .param("kind", CacheKind::Extract.as_str())
            .finish();
        if let Some(content) = self
            .cache
            .get_json::<ExtractedContent>(CacheKind::Extract, &key)
            .await
        {
            debug!(url, "Extraction served from cache");
            return Ok(content);
        }
        let content = self.extractor.extract(url).await?;
        self.cache
            .set_json(CacheKind::Extract, &key, &content, self.ttls.extract)
            .await;
        Ok(content)
    }
}

/// Open the attempt's stream and wait for its first non-empty chunk
///
/// An attempt only counts as successful once it has produced output, so a stream
/// that ends empty fails the attempt and lets the runner fall back.
async fn open_with_first_chunk(
    executor: &dyn ModelExecutorPort,
    attempt: &ModelAttempt,
    prompt: &ModelPrompt,
) -> Result<(String, OutputStream), ApplicationError> {
    let mut stream = executor.open_stream(attempt, prompt).await?;
    while let Some(piece) = stream.next().await {
        let piece = piece?;
        if !piece.is_empty() {
            return Ok((piece, stream));
        }
    }
    Err(ApplicationError::EmptyOutput(
        attempt.user_facing_model_id.clone(),
    ))
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
