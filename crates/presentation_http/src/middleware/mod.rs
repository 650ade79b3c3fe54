//! HTTP middleware components
//!
//! Authentication, CORS and request validation.

pub mod auth;
pub mod cors;
pub mod validation;

pub use auth::{BearerAuth, BearerAuthLayer};
pub use cors::cors_layer;
pub use validation::{ValidatedJson, ValidationError};
