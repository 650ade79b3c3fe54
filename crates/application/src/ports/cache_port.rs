//! Cache port definition
//!
//! The cache is a performance optimization only. Implementations absorb their own
//! I/O and corruption errors: a failed read is a miss, a failed write is skipped.

use std::time::Duration;

use async_trait::async_trait;
use domain::{CacheKind, ContentFingerprint};
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

/// Cache port for storing and retrieving fingerprinted payloads
#[async_trait]
pub trait CachePort: Send + Sync + std::fmt::Debug {
    /// Get a cached value; expired entries are absent (and purged)
    async fn get(&self, kind: CacheKind, key: &ContentFingerprint) -> Option<Vec<u8>>;

    /// Upsert a value. `None` never expires, `Some(ZERO)` expires immediately
    async fn set(
        &self,
        kind: CacheKind,
        key: &ContentFingerprint,
        value: Vec<u8>,
        ttl: Option<Duration>,
    );

    /// Remove every entry
    async fn clear(&self);

    /// Release the backing store; later calls behave as misses / no-ops
    async fn close(&self);

    /// Current statistics
    async fn stats(&self) -> CacheStats;
}

/// Typed JSON helpers on top of the byte interface
#[async_trait]
pub trait CachePortExt: CachePort {
    /// Get and decode a JSON value; undecodable payloads count as misses
    async fn get_json<T>(&self, kind: CacheKind, key: &ContentFingerprint) -> Option<T>
    where
        T: DeserializeOwned + Send,
    {
        let bytes = self.get(kind, key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(kind = %kind, error = %e, "Discarding undecodable cache payload");
                None
            },
        }
    }

    /// Encode and store a JSON value
    async fn set_json<T>(
        &self,
        kind: CacheKind,
        key: &ContentFingerprint,
        value: &T,
        ttl: Option<Duration>,
    ) where
        T: Serialize + Send + Sync,
    {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set(kind, key, bytes, ttl).await,
            Err(e) => warn!(kind = %kind, error = %e, "Skipping unserializable cache payload"),
        }
    }
}

impl<T: CachePort + ?Sized> CachePortExt for T {}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits since start
    pub hits: u64,
    /// Number of cache misses since start
    pub misses: u64,
    /// Current number of entries
    pub entries: u64,
    /// Sum of stored payload sizes
    pub total_bytes: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 - 1.0)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
