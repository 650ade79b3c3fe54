//! Free-model catalog backed by the aggregator's model listing

use std::sync::Arc;

use ai_core::{OpenAiCompatClient, OpenAiCompatConfig};
use application::{
    AGGREGATOR_CREDENTIAL,
    error::ApplicationError,
    ports::{CredentialPort, FreeModelCatalogPort},
};
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::model_executor::map_inference_error;

/// Lists the aggregator's zero-cost models
pub struct AggregatorFreeCatalog {
    client: OpenAiCompatClient,
    credentials: Arc<dyn CredentialPort>,
}

impl std::fmt::Debug for AggregatorFreeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorFreeCatalog")
            .field("base_url", &self.client.base_url())
            .finish_non_exhaustive()
    }
}

impl AggregatorFreeCatalog {
    pub fn new(
        config: OpenAiCompatConfig,
        credentials: Arc<dyn CredentialPort>,
    ) -> Result<Self, ApplicationError> {
        Ok(Self {
            client: OpenAiCompatClient::new(config).map_err(map_inference_error)?,
            credentials,
        })
    }
}

#[async_trait]
impl FreeModelCatalogPort for AggregatorFreeCatalog {
    #[instrument(skip(self))]
    async fn list_free_models(&self) -> Result<Vec<String>, ApplicationError> {
        let key = self
            .credentials
            .get(AGGREGATOR_CREDENTIAL)
            .ok_or_else(|| ApplicationError::MissingCredential(AGGREGATOR_CREDENTIAL.to_string()))?;
        let models = self
            .client
            .list_models(Some(&key))
            .await
            .map_err(map_inference_error)?;

        let total = models.len();
        let free: Vec<String> = models
            .into_iter()
            .filter(ai_core::ModelInfo::is_free)
            .map(|m| m.id)
            .collect();
        debug!(total, free = free.len(), "Filtered free models");
        Ok(free)
    }
}
