//! SQLite persistence: pooled connections and schema migrations

pub mod connection;
pub mod migrations;

pub use connection::{ConnectionPool, DatabaseError, MEMORY_PATH, PooledConn, create_pool};
pub use migrations::{SCHEMA_VERSION, run_migrations};
