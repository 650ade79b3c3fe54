//! Request and chunk types shared by the transports

use std::pin::Pin;

use domain::ProviderConstraints;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// A message in an OpenAI-compatible chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Streaming chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Aggregator routing preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConstraints>,
}

impl ChatRequest {
    /// Streaming request with an optional system message
    pub fn streaming(model: impl Into<String>, system: &str, user: impl Into<String>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(user));
        Self {
            model: model.into(),
            messages,
            stream: true,
            max_tokens: None,
            provider: None,
        }
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Option<ProviderConstraints>) -> Self {
        self.provider = provider;
        self
    }
}

/// A piece of streamed output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingChunk {
    /// Content delta
    pub content: String,
    /// Whether this is the final chunk
    pub done: bool,
}

impl StreamingChunk {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
        }
    }

    pub const fn done() -> Self {
        Self {
            content: String::new(),
            done: true,
        }
    }
}

/// Type alias for streaming response
pub type StreamingResponse =
    Pin<Box<dyn Stream<Item = Result<StreamingChunk, InferenceError>> + Send>>;
