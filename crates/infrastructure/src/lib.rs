//! Infrastructure layer - Adapters for external systems
//!
//! Implements the application ports: the SQLite cache store, environment
//! credentials, the HTTP extractor, the transport-dispatching model executor and
//! the free-model catalog and store. Also owns configuration loading, retry
//! policy and logging setup.

pub mod adapters;
pub mod cache;
pub mod config;
pub mod persistence;
pub mod retry;
pub mod telemetry;

pub use adapters::*;
pub use cache::{CacheLimits, DisabledCache, SqliteCacheStore};
pub use config::{AppConfig, CacheConfig, SecurityConfig, ServerConfig, SessionsConfig};
pub use persistence::{ConnectionPool, DatabaseError, create_pool};
pub use retry::{RetryConfig, retry};
pub use telemetry::{TelemetryError, init_tracing};
