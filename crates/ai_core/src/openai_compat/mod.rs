//! OpenAI-compatible transport
//!
//! Serves vendor APIs and the aggregator alike; they differ only in base URL,
//! credential and the optional `provider` routing object.

mod client;
pub mod streaming;

pub use client::{ModelInfo, ModelPricing, OpenAiCompatClient};
