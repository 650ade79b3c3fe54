//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations.

mod env_credentials;
mod free_model_catalog;
mod free_model_store;
mod http_extractor;
mod model_executor;

pub use env_credentials::EnvCredentials;
pub use free_model_catalog::AggregatorFreeCatalog;
pub use free_model_store::JsonFreeModelStore;
pub use http_extractor::HttpContentExtractor;
pub use model_executor::{TransportModelExecutor, map_inference_error};
