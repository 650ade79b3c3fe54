//! Inference errors

use thiserror::Error;

/// Errors that can occur while talking to a model
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Failed to connect to the backend
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request could not be sent or completed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Credential rejected (401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded (429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Backend rejected the request (other 4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Backend failed (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Response parsing failed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Timeout during inference
    #[error("Inference timeout after {0}ms")]
    Timeout(u64),

    /// Streaming error
    #[error("Stream error: {0}")]
    StreamError(String),

    /// The stream ended without any content
    #[error("Empty output from {0}")]
    EmptyOutput(String),

    /// The local tool could not be started
    #[error("Failed to start {0}")]
    SpawnFailed(String),

    /// The local tool exited unsuccessfully
    #[error("Process failed: {0}")]
    ProcessFailed(String),
}

impl InferenceError {
    /// Map a non-success HTTP status to an error
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {}", body.chars().take(500).collect::<String>())
        };
        match status.as_u16() {
            401 | 403 => Self::Unauthorized(detail),
            429 => Self::RateLimited(detail),
            500..=599 => Self::ServerError(detail),
            _ => Self::InvalidRequest(detail),
        }
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(0)
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::RequestFailed(err.to_string())
        }
    }
}
