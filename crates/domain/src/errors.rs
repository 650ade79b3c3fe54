//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// Invalid model identifier
    #[error("Invalid model id: {0}")]
    InvalidModelId(String),

    /// Invalid summary length
    #[error("Invalid length: {0}")]
    InvalidLength(String),

    /// Unknown cache kind
    #[error("Unknown cache kind: {0}")]
    UnknownCacheKind(String),

    /// Entity not found
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}
