//! Model execution port
//!
//! One call executes one [`ModelAttempt`]; fallback across attempts is the runner's
//! job. Adapters retry transient failures internally before giving up.

use std::pin::Pin;

use async_trait::async_trait;
use domain::ModelAttempt;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// Incremental model output
pub type OutputStream = Pin<Box<dyn Stream<Item = Result<String, ApplicationError>> + Send>>;

/// Prompt handed to a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPrompt {
    pub system: String,
    pub user: String,
    pub max_output_tokens: Option<u32>,
}

impl ModelPrompt {
    /// Both parts joined, for transports without a system role
    pub fn flattened(&self) -> String {
        if self.system.is_empty() {
            self.user.clone()
        } else {
            format!("{}\n\n{}", self.system, self.user)
        }
    }
}

/// Port for running a prompt against one attempt
#[async_trait]
pub trait ModelExecutorPort: Send + Sync {
    /// Start streaming output for `attempt`
    async fn open_stream(
        &self,
        attempt: &ModelAttempt,
        prompt: &ModelPrompt,
    ) -> Result<OutputStream, ApplicationError>;

    /// Run to completion and return the whole output
    async fn complete(
        &self,
        attempt: &ModelAttempt,
        prompt: &ModelPrompt,
    ) -> Result<String, ApplicationError> {
        let mut stream = self.open_stream(attempt, prompt).await?;
        let mut output = String::new();
        while let Some(piece) = stream.next().await {
            output.push_str(&piece?);
        }
        if output.trim().is_empty() {
            return Err(ApplicationError::EmptyOutput(
                attempt.user_facing_model_id.clone(),
            ));
        }
        Ok(output)
    }
}
