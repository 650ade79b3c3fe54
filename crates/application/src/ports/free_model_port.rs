//! Ports backing the free-model refresh job

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Lists models the aggregator offers at no cost
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FreeModelCatalogPort: Send + Sync {
    /// Backend ids of free models, in the aggregator's order
    async fn list_free_models(&self) -> Result<Vec<String>, ApplicationError>;
}

/// Persists the list of free models that answered a probe
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FreeModelStorePort: Send + Sync {
    /// Last saved list; empty when nothing was saved yet
    async fn load(&self) -> Result<Vec<String>, ApplicationError>;

    /// Replace the saved list
    async fn save(&self, models: &[String]) -> Result<(), ApplicationError>;
}
