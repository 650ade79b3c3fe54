//! OpenAI-compatible chat completion client

use std::time::Duration;

use reqwest::{
    Client,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::streaming::decode_stream;
use crate::{
    config::OpenAiCompatConfig,
    error::InferenceError,
    ports::{ChatRequest, StreamingResponse},
};

/// Model entry from `GET /models`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub pricing: Option<ModelPricing>,
}

/// Per-token prices as decimal strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelPricing {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub completion: String,
}

impl ModelInfo {
    /// `:free` variants, or zero prompt and completion prices
    pub fn is_free(&self) -> bool {
        if self.id.ends_with(":free") {
            return true;
        }
        self.pricing
            .as_ref()
            .is_some_and(|p| is_zero_price(&p.prompt) && is_zero_price(&p.completion))
    }
}

fn is_zero_price(price: &str) -> bool {
    price.trim().parse::<f64>().is_ok_and(|p| p.abs() < f64::EPSILON)
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

/// Client for one OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, InferenceError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| InferenceError::RequestFailed(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| InferenceError::RequestFailed(format!("header {name}: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed(e.to_string()))?;

        info!(base_url = %config.base_url, "Initialized OpenAI-compatible client");
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Start a streaming chat completion
    #[instrument(skip(self, api_key, request), fields(model = %request.model, base_url = %self.config.base_url))]
    pub async fn stream_chat(
        &self,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<StreamingResponse, InferenceError> {
        debug!("Starting streaming chat request");
        let response = self
            .client
            .post(self.api_url("chat/completions"))
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Chat request failed");
            return Err(InferenceError::from_status(status, &body));
        }

        Ok(decode_stream(response.bytes_stream(), request.model.clone()))
    }

    /// List the endpoint's models
    #[instrument(skip(self, api_key))]
    pub async fn list_models(&self, api_key: Option<&str>) -> Result<Vec<ModelInfo>, InferenceError> {
        let mut builder = self.client.get(self.api_url("models"));
        if let Some(key) = api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::from_status(status, &body));
        }

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;
        debug!(count = models.data.len(), "Listed models");
        Ok(models.data)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> InferenceError {
        if err.is_timeout() {
            InferenceError::Timeout(self.config.timeout_ms)
        } else {
            err.into()
        }
    }
}
