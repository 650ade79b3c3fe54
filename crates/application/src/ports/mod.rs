//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod cache_port;
mod content_extractor_port;
mod credential_port;
mod free_model_port;
mod model_executor_port;

pub use cache_port::{CachePort, CachePortExt, CacheStats};
pub use content_extractor_port::{ContentExtractorPort, ExtractedContent};
#[cfg(test)]
pub use content_extractor_port::MockContentExtractorPort;
pub use credential_port::CredentialPort;
#[cfg(test)]
pub use credential_port::MockCredentialPort;
pub use free_model_port::{FreeModelCatalogPort, FreeModelStorePort};
#[cfg(test)]
pub use free_model_port::{MockFreeModelCatalogPort, MockFreeModelStorePort};
pub use model_executor_port::{ModelExecutorPort, ModelPrompt, OutputStream};
