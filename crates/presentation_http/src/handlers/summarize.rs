//! Summarize endpoint
//!
//! Validation, length/mode parsing and attempt planning all happen before a
//! session is created, so a bad request never leaves a session behind. Once the
//! id is returned, every outcome is reported through the session's events.

use std::sync::Arc;

use application::{SummarizeMode, SummarizeRequest};
use axum::{Json, extract::State};
use domain::SummaryLength;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::{error::ApiError, middleware::ValidatedJson, state::AppState, tasks::supervise};

/// `POST /v1/summarize` body
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeBody {
    #[validate(length(min = 1, max = 8192, message = "must be between 1 and 8192 characters"))]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub length: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub no_cache: bool,
    #[validate(range(min = 1, message = "must be at least 1"))]
    #[serde(default)]
    pub max_characters: Option<usize>,
}

/// Accepted work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub ok: bool,
    pub id: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SummarizeBody {
    /// Parse the free-form fields into a request
    pub fn into_request(self) -> Result<SummarizeRequest, ApiError> {
        if self.url.trim().is_empty() {
            return Err(ApiError::BadRequest("url: must not be blank".to_string()));
        }
        let length = match non_blank(self.length) {
            Some(raw) => raw
                .parse::<SummaryLength>()
                .map_err(|e| ApiError::BadRequest(format!("length: {e}")))?,
            None => SummaryLength::default(),
        };
        let mode = match non_blank(self.mode) {
            Some(raw) => raw.parse::<SummarizeMode>()?,
            None => SummarizeMode::default(),
        };
        let has_text = self.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        if mode == SummarizeMode::Page && !has_text {
            return Err(ApiError::BadRequest(
                "text: required when mode is 'page'".to_string(),
            ));
        }

        Ok(SummarizeRequest {
            url: self.url.trim().to_string(),
            title: non_blank(self.title),
            text: self.text,
            truncated: self.truncated,
            model: non_blank(self.model),
            length,
            language: non_blank(self.language),
            mode,
            no_cache: self.no_cache,
            max_characters: self.max_characters,
        })
    }
}

/// `POST /v1/summarize`
#[instrument(skip_all)]
pub async fn summarize(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<SummarizeBody>,
) -> Result<Json<AcceptedResponse>, ApiError> {
    let request = body.into_request()?;
    let attempts = state
        .summarize
        .plan(request.model.as_deref())
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let session = state.sessions.create();
    info!(
        session_id = %session,
        url = %request.url,
        attempts = attempts.len(),
        "Summarize accepted"
    );

    let service = Arc::clone(&state.summarize);
    tokio::spawn(supervise(
        Arc::clone(&state.sessions),
        session,
        async move { service.run(session, request, attempts).await },
    ));

    Ok(Json(AcceptedResponse {
        ok: true,
        id: session.to_string(),
    }))
}
