//! Database connection management
//!
//! Provides SQLite connection pooling via r2d2. Every pooled connection is
//! initialised with the same PRAGMAs.

use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info};

/// Database errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Blocking task failed: {0}")]
    Task(String),
}

/// SQLite connection pool type alias
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Pooled connection type alias
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Path that selects a private in-memory database
pub const MEMORY_PATH: &str = ":memory:";

const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Create a connection pool and bring the schema up to date
pub fn create_pool(path: &Path, max_connections: u32) -> Result<ConnectionPool, DatabaseError> {
    info!(path = %path.display(), max_connections, "Creating database connection pool");

    let in_memory = path.as_os_str() == MEMORY_PATH;
    let manager = if in_memory {
        SqliteConnectionManager::memory()
    } else {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::Migration(format!("Failed to create database directory: {e}"))
                })?;
            }
        }
        SqliteConnectionManager::file(path)
    }
    .with_init(|conn| initialize_connection(conn));

    // Each in-memory connection would be its own database
    let max_size = if in_memory { 1 } else { max_connections.max(1) };
    let pool = Pool::builder().max_size(max_size).build(manager)?;

    {
        let conn = pool.get()?;
        crate::persistence::migrations::run_migrations(&conn)?;
    }

    debug!("Database connection pool created successfully");
    Ok(pool)
}

/// PRAGMAs applied to every new connection
///
/// `auto_vacuum` only takes effect before the first table exists, which is why it
/// runs here rather than in a migration.
fn initialize_connection(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&format!(
        "
        PRAGMA auto_vacuum = INCREMENTAL;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};
        "
    ))
}
