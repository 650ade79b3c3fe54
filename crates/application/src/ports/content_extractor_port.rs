//! Content extraction port
//!
//! Fetching and cleaning up page content is an external collaborator; the daemon only
//! needs plain text and an optional title back.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// Plain-text content of a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

/// Port for turning a URL into text
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentExtractorPort: Send + Sync {
    /// Fetch and extract the readable text behind `url`
    async fn extract(&self, url: &str) -> Result<ExtractedContent, ApplicationError>;
}
