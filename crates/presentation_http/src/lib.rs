//! Summarize daemon HTTP presentation layer
//!
//! Accepts summarize and refresh-free requests, hands each one to a session and
//! streams the session's events back as server-sent events.

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod tasks;

pub use bootstrap::{BootstrapError, Ports, build_state};
pub use error::ApiError;
pub use middleware::{BearerAuthLayer, ValidatedJson, ValidationError, cors_layer};
pub use routes::create_router;
pub use state::AppState;
pub use tasks::spawn_session_sweeper;
