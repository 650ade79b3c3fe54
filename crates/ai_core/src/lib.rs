//! AI Core - Language-model transports
//!
//! Two ways of reaching a model: OpenAI-compatible chat completion APIs (used for
//! both vendor APIs and the aggregator) and locally installed CLI tools. Both yield
//! the same stream of [`StreamingChunk`]s.

pub mod config;
pub mod error;
pub mod local_process;
pub mod openai_compat;
pub mod ports;

pub use config::{LocalToolConfig, OpenAiCompatConfig};
pub use error::InferenceError;
pub use local_process::LocalProcessClient;
pub use openai_compat::{ModelInfo, ModelPricing, OpenAiCompatClient};
pub use ports::{ChatMessage, ChatRequest, StreamingChunk, StreamingResponse};
