//! One candidate (transport, model) combination tried by the attempt runner

use std::fmt;

use serde::{Deserialize, Serialize};

/// How an attempt reaches its model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// The model vendor's own API
    DirectProviderApi,
    /// A multi-vendor routing API
    AggregatorApi,
    /// A locally installed CLI tool
    LocalProcess,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectProviderApi => f.write_str("direct"),
            Self::AggregatorApi => f.write_str("aggregator"),
            Self::LocalProcess => f.write_str("local"),
        }
    }
}

/// Routing preferences forwarded to an aggregator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConstraints {
    /// Upstream providers to prefer, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<String>,
    /// Whether the aggregator may route outside `order`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_fallbacks: Option<bool>,
}

/// Immutable description of a single attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAttempt {
    pub transport: Transport,
    /// Id shown to the user, e.g. `openai/gpt-5-mini`
    pub user_facing_model_id: String,
    /// Id sent to the backend when it differs from the user-facing one
    pub backend_model_id: Option<String>,
    /// Environment credential the attempt cannot run without
    pub required_credential: Option<String>,
    pub provider_constraints: Option<ProviderConstraints>,
}

impl ModelAttempt {
    /// Attempt against a vendor API
    pub fn direct(
        user_facing: impl Into<String>,
        backend_model: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            transport: Transport::DirectProviderApi,
            user_facing_model_id: user_facing.into(),
            backend_model_id: Some(backend_model.into()),
            required_credential: Some(credential.into()),
            provider_constraints: None,
        }
    }

    /// Attempt routed through the aggregator
    pub fn aggregator(
        user_facing: impl Into<String>,
        backend_model: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            transport: Transport::AggregatorApi,
            user_facing_model_id: user_facing.into(),
            backend_model_id: Some(backend_model.into()),
            required_credential: Some(credential.into()),
            provider_constraints: None,
        }
    }

    /// Attempt executed by a local CLI tool
    pub fn local_process(user_facing: impl Into<String>, backend_model: Option<String>) -> Self {
        Self {
            transport: Transport::LocalProcess,
            user_facing_model_id: user_facing.into(),
            backend_model_id: backend_model,
            required_credential: None,
            provider_constraints: None,
        }
    }

    #[must_use]
    pub fn with_constraints(mut self, constraints: ProviderConstraints) -> Self {
        self.provider_constraints = Some(constraints);
        self
    }

    /// Model id to put on the wire
    pub fn backend_model(&self) -> &str {
        self.backend_model_id
            .as_deref()
            .unwrap_or(&self.user_facing_model_id)
    }
}

impl fmt::Display for ModelAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.user_facing_model_id, self.transport)
    }
}
