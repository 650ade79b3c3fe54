//! Ordered model attempt runner
//!
//! Attempts are tried strictly in order and the first success wins. Failures are
//! classified to decide what the caller finally sees: when every attempt failed for
//! lack of a credential the caller gets one aggregated error naming all of them,
//! otherwise the last observed error.

use std::{fmt, future::Future, sync::Arc};

use domain::ModelAttempt;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{ApplicationError, FailureClass},
    ports::CredentialPort,
};

/// Progress of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Pending,
    Trying(usize),
    Succeeded(usize),
    Exhausted,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Trying(i) => write!(f, "trying({i})"),
            Self::Succeeded(i) => write!(f, "succeeded({i})"),
            Self::Exhausted => f.write_str("exhausted"),
        }
    }
}

/// Winning attempt and its result
#[derive(Debug)]
pub struct AttemptSuccess<T> {
    pub value: T,
    pub attempt: ModelAttempt,
    /// Position of the winning attempt in the list
    pub index: usize,
    /// Number of attempts started, the winner included
    pub tried: usize,
}

/// Runs attempt lists against an executor closure
#[derive(Clone)]
pub struct ModelAttemptRunner {
    credentials: Arc<dyn CredentialPort>,
}

impl fmt::Debug for ModelAttemptRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelAttemptRunner").finish_non_exhaustive()
    }
}

impl ModelAttemptRunner {
    pub fn new(credentials: Arc<dyn CredentialPort>) -> Self {
        Self { credentials }
    }

    /// Try `attempts` in order until `execute` succeeds
    ///
    /// An attempt whose required credential is not configured fails without calling
    /// `execute`. The executor is responsible for its own per-attempt retries.
    #[instrument(skip(self, attempts, execute), fields(attempts = attempts.len()))]
    pub async fn run<T, F, Fut>(
        &self,
        attempts: &[ModelAttempt],
        mut execute: F,
    ) -> Result<AttemptSuccess<T>, ApplicationError>
    where
        F: FnMut(ModelAttempt) -> Fut,
        Fut: Future<Output = Result<T, ApplicationError>>,
    {
        let mut state = RunnerState::Pending;
        debug!(%state, "Attempt run starting");
        if attempts.is_empty() {
            return Err(ApplicationError::NoAttempts);
        }

        let mut missing: Vec<String> = Vec::new();
        let mut only_missing_credentials = true;
        let mut last_error = None;

        for (index, attempt) in attempts.iter().enumerate() {
            state = RunnerState::Trying(index);
            debug!(%state, attempt = %attempt, "Trying attempt");

            let outcome = match attempt.required_credential.as_deref() {
                Some(name) if !self.credentials.has(name) => {
                    Err(ApplicationError::MissingCredential(name.to_string()))
                },
                _ => execute(attempt.clone()).await,
            };

            match outcome {
                Ok(value) => {
                    state = RunnerState::Succeeded(index);
                    info!(%state, attempt = %attempt, "Attempt succeeded");
                    return Ok(AttemptSuccess {
                        value,
                        attempt: attempt.clone(),
                        index,
                        tried: index + 1,
                    });
                },
                Err(error @ ApplicationError::Cancelled(_)) => {
                    // The session is gone; later attempts have nowhere to report to
                    debug!(attempt = %attempt, "Attempt run cancelled");
                    return Err(error);
                },
                Err(error) => {
                    match error.failure_class() {
                        FailureClass::MissingCredential(name) => {
                            debug!(attempt = %attempt, credential = %name, "Attempt skipped");
                            if !missing.contains(&name) {
                                missing.push(name);
                            }
                        },
                        FailureClass::Transient => {
                            only_missing_credentials = false;
                            warn!(attempt = %attempt, error = %error, "Attempt failed, falling back");
                        },
                        FailureClass::Fatal => {
                            only_missing_credentials = false;
                            warn!(attempt = %attempt, error = %error, "Attempt rejected, falling back");
                        },
                    }
                    last_error = Some(error);
                },
            }
        }

        state = RunnerState::Exhausted;
        warn!(%state, "All attempts failed");
        if only_missing_credentials {
            return Err(ApplicationError::MissingCredentials(missing));
        }
        Err(last_error.unwrap_or(ApplicationError::NoAttempts))
    }
}
