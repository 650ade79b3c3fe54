//! Cache implementations
//!
//! - `SqliteCacheStore`: persistent store shared by every cache kind
//! - `DisabledCache`: used when caching is switched off

mod sqlite_cache;

pub use sqlite_cache::{CacheLimits, DisabledCache, SqliteCacheStore};
