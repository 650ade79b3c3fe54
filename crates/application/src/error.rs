//! Application-level errors

use domain::DomainError;
use thiserror::Error;

/// How the attempt runner treats a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureClass {
    /// The attempt's credential is not configured
    MissingCredential(String),
    /// Timeouts, rate limits, empty or invalid output
    Transient,
    /// The request itself was rejected
    Fatal,
}

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Request failed validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown session or resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// A single attempt lacks its credential
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Every attempt lacked its credential
    #[error("Missing any of: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),

    /// Backend did not answer in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Backend asked us to slow down
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Backend answered with nothing usable
    #[error("Empty output from {0}")]
    EmptyOutput(String),

    /// Backend rejected the request as malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Inference/AI error
    #[error("Inference error: {0}")]
    Inference(String),

    /// External service error (extraction, catalogs)
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Work was abandoned
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Nothing to try
    #[error("No model attempts available")]
    NoAttempts,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Check if this error is worth retrying against the same backend
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited(_) | Self::ExternalService(_) | Self::Inference(_)
        )
    }

    /// Classification used by the attempt runner
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::MissingCredential(name) => FailureClass::MissingCredential(name.clone()),
            Self::Timeout(_)
            | Self::RateLimited(_)
            | Self::EmptyOutput(_)
            | Self::Inference(_)
            | Self::ExternalService(_) => FailureClass::Transient,
            Self::Domain(_)
            | Self::Validation(_)
            | Self::NotFound(_)
            | Self::MissingCredentials(_)
            | Self::InvalidRequest(_)
            | Self::Cancelled(_)
            | Self::NoAttempts
            | Self::Configuration(_)
            | Self::Internal(_) => FailureClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregated_credentials_message_lists_names() {
        let err = ApplicationError::MissingCredentials(vec![
            "OPENAI_API_KEY".to_string(),
            "OPENROUTER_API_KEY".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing any of: OPENAI_API_KEY, OPENROUTER_API_KEY"
        );
    }

    #[test]
    fn transient_errors_are_classified() {
        for err in [
            ApplicationError::Timeout("t".into()),
            ApplicationError::RateLimited("r".into()),
            ApplicationError::EmptyOutput("m".into()),
        ] {
            assert_eq!(err.failure_class(), FailureClass::Transient);
        }
    }

    #[test]
    fn missing_credential_carries_name() {
        let err = ApplicationError::MissingCredential("XAI_API_KEY".into());
        assert_eq!(
            err.failure_class(),
            FailureClass::MissingCredential("XAI_API_KEY".into())
        );
    }

    #[test]
    fn invalid_request_is_fatal_and_not_retryable() {
        let err = ApplicationError::InvalidRequest("bad".into());
        assert_eq!(err.failure_class(), FailureClass::Fatal);
        assert!(!err.is_retryable());
    }

    #[test]
    fn rate_limit_is_retryable() {
        assert!(ApplicationError::RateLimited("429".into()).is_retryable());
        assert!(!ApplicationError::EmptyOutput("m".into()).is_retryable());
    }
}
