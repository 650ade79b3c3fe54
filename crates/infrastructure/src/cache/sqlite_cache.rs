//! SQLite-backed cache store
//!
//! Rows live in `cache_entries`, keyed by `(kind, key)`. Reads use pooled
//! connections concurrently; every write goes through one writer lock. Expired rows
//! are dropped lazily on read and swept on every write. After a write the store
//! evicts least-recently-accessed rows in batches until the total size fits under
//! the ceiling, then reclaims freed pages.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use application::ports::{CachePort, CacheStats};
use async_trait::async_trait;
use domain::{CacheKind, ContentFingerprint};
use parking_lot::{Mutex, RwLock};
use rusqlite::{OptionalExtension, params};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::CacheConfig,
    persistence::{ConnectionPool, DatabaseError, create_pool},
};

/// Size ceiling and eviction batching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub max_bytes: u64,
    pub eviction_batch_size: u32,
    pub max_eviction_batches: u32,
}

impl Default for CacheLimits {
    fn default() -> Self {
        let config = CacheConfig::default();
        Self::from(&config)
    }
}

impl From<&CacheConfig> for CacheLimits {
    fn from(config: &CacheConfig) -> Self {
        Self {
            max_bytes: config.max_bytes,
            eviction_batch_size: config.eviction_batch_size.max(1),
            max_eviction_batches: config.max_eviction_batches.max(1),
        }
    }
}

struct Inner {
    pool: RwLock<Option<ConnectionPool>>,
    writer: Mutex<()>,
    limits: CacheLimits,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Persistent cache store
#[derive(Clone)]
pub struct SqliteCacheStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SqliteCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCacheStore")
            .field("open", &self.inner.pool.read().is_some())
            .field("limits", &self.inner.limits)
            .field("hits", &self.inner.hits.load(Ordering::Relaxed))
            .field("misses", &self.inner.misses.load(Ordering::Relaxed))
            .finish()
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn expiry(now: i64, ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)))
}

impl SqliteCacheStore {
    /// Open the store described by `config`
    pub fn open(config: &CacheConfig) -> Result<Self, DatabaseError> {
        Self::with_limits(
            &config.resolved_path(),
            config.max_connections,
            CacheLimits::from(config),
        )
    }

    /// Open a store at `path` with explicit limits
    pub fn with_limits(
        path: &Path,
        max_connections: u32,
        limits: CacheLimits,
    ) -> Result<Self, DatabaseError> {
        let pool = create_pool(path, max_connections)?;
        info!(
            path = %path.display(),
            max_bytes = limits.max_bytes,
            "Opened cache store"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                pool: RwLock::new(Some(pool)),
                writer: Mutex::new(()),
                limits,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        })
    }

    pub fn limits(&self) -> CacheLimits {
        self.inner.limits
    }

    /// Remove every entry of one kind
    #[instrument(skip(self))]
    pub async fn clear_kind(&self, kind: CacheKind) {
        let removed = self
            .blocking("clear_kind", move |inner, pool| {
                let conn = pool.get()?;
                let _guard = inner.writer.lock();
                let removed =
                    conn.execute("DELETE FROM cache_entries WHERE kind = ?1", [kind.as_str()])?;
                conn.execute_batch("PRAGMA incremental_vacuum;")?;
                Ok(removed)
            })
            .await;
        debug!(removed = ?removed, "Cleared cache kind");
    }

    /// Run `op` on the blocking pool; errors are logged and become `None`
    async fn blocking<T, F>(&self, op: &'static str, f: F) -> Option<T>
    where
        F: FnOnce(&Inner, &ConnectionPool) -> Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.inner.pool.read().clone()?;
        let inner = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || f(&inner, &pool)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(op, error = %e, "Cache operation failed");
                None
            },
            Err(e) => {
                warn!(op, error = %e, "Cache task failed");
                None
            },
        }
    }
}

impl Inner {
    fn read(
        &self,
        pool: &ConnectionPool,
        kind: CacheKind,
        key: &str,
    ) -> Result<Option<Vec<u8>>, DatabaseError> {
        let conn = pool.get()?;
        let now = now_ms();
        let row: Option<(Vec<u8>, Option<i64>)> = conn
            .query_row(
                "SELECT value, expires_at FROM cache_entries WHERE kind = ?1 AND key = ?2",
                params![kind.as_str(), key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((value, expires_at)) = row else {
            return Ok(None);
        };

        let _guard = self.writer.lock();
        if expires_at.is_some_and(|at| at <= now) {
            conn.execute(
                "DELETE FROM cache_entries WHERE kind = ?1 AND key = ?2 AND expires_at <= ?3",
                params![kind.as_str(), key, now],
            )?;
            return Ok(None);
        }
        conn.execute(
            "UPDATE cache_entries SET last_accessed_at = ?3 WHERE kind = ?1 AND key = ?2",
            params![kind.as_str(), key, now],
        )?;
        Ok(Some(value))
    }

    fn write(
        &self,
        pool: &ConnectionPool,
        kind: CacheKind,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<u64, DatabaseError> {
        let mut conn = pool.get()?;
        let now = now_ms();
        let size = to_i64(value.len() as u64);

        let _guard = self.writer.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            [now],
        )?;
        tx.execute(
            "INSERT INTO cache_entries
                (kind, key, value, size_bytes, created_at, last_accessed_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6)
             ON CONFLICT(kind, key) DO UPDATE SET
                value = excluded.value,
                size_bytes = excluded.size_bytes,
                last_accessed_at = excluded.last_accessed_at,
                expires_at = excluded.expires_at",
            params![kind.as_str(), key, value, size, now, expiry(now, ttl)],
        )?;

        let evicted = self.evict(&tx, kind, key)?;
        tx.commit()?;

        if evicted > 0 {
            conn.execute_batch("PRAGMA incremental_vacuum;")?;
        }
        Ok(evicted)
    }

    /// Delete least-recently-accessed rows, sparing the row just written
    fn evict(
        &self,
        tx: &rusqlite::Transaction<'_>,
        kind: CacheKind,
        key: &str,
    ) -> Result<u64, DatabaseError> {
        let ceiling = to_i64(self.limits.max_bytes);
        let mut evicted = 0u64;
        for _ in 0..self.limits.max_eviction_batches {
            let total: i64 = tx.query_row(
                "SELECT COALESCE(SUM(size_bytes), 0) FROM cache_entries",
                [],
                |row| row.get(0),
            )?;
            if total <= ceiling {
                break;
            }
            let removed = tx.execute(
                "DELETE FROM cache_entries WHERE rowid IN (
                    SELECT rowid FROM cache_entries
                    WHERE NOT (kind = ?1 AND key = ?2)
                    ORDER BY last_accessed_at ASC, rowid ASC
                    LIMIT ?3
                )",
                params![kind.as_str(), key, self.limits.eviction_batch_size],
            )?;
            if removed == 0 {
                break;
            }
            evicted += removed as u64;
        }
        if evicted > 0 {
            debug!(evicted, "Evicted cache entries");
        }
        Ok(evicted)
    }

    fn totals(pool: &ConnectionPool) -> Result<(u64, u64), DatabaseError> {
        let conn = pool.get()?;
        let (entries, bytes): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM cache_entries",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((
            u64::try_from(entries).unwrap_or_default(),
            u64::try_from(bytes).unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl CachePort for SqliteCacheStore {
    #[instrument(skip(self, key), fields(kind = %kind))]
    async fn get(&self, kind: CacheKind, key: &ContentFingerprint) -> Option<Vec<u8>> {
        let key = key.as_str().to_string();
        let value = self
            .blocking("get", move |inner, pool| inner.read(pool, kind, &key))
            .await
            .flatten();

        if value.is_some() {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit");
        } else {
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache miss");
        }
        value
    }

    #[instrument(skip(self, key, value), fields(kind = %kind, size = value.len()))]
    async fn set(
        &self,
        kind: CacheKind,
        key: &ContentFingerprint,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) {
        if value.len() as u64 > self.inner.limits.max_bytes {
            debug!(
                max_bytes = self.inner.limits.max_bytes,
                "Value larger than the cache ceiling, not stored"
            );
            return;
        }
        let key = key.as_str().to_string();
        self.blocking("set", move |inner, pool| {
            inner.write(pool, kind, &key, &value, ttl)
        })
        .await;
    }

    #[instrument(skip(self))]
    async fn clear(&self) {
        self.blocking("clear", |inner, pool| {
            let conn = pool.get()?;
            let _guard = inner.writer.lock();
            conn.execute("DELETE FROM cache_entries", [])?;
            conn.execute_batch("PRAGMA incremental_vacuum;")?;
            Ok(())
        })
        .await;
        info!("Cache cleared");
    }

    async fn close(&self) {
        if self.inner.pool.write().take().is_some() {
            info!("Cache store closed");
        }
    }

    async fn stats(&self) -> CacheStats {
        let (entries, total_bytes) = self
            .blocking("stats", |_, pool| Inner::totals(pool))
            .await
            .unwrap_or_default();
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            entries,
            total_bytes,
        }
    }
}

/// Stand-in used when caching is switched off: every read misses
#[derive(Debug, Default)]
pub struct DisabledCache {
    misses: AtomicU64,
}

impl DisabledCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CachePort for DisabledCache {
    async fn get(&self, _kind: CacheKind, _key: &ContentFingerprint) -> Option<Vec<u8>> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn set(
        &self,
        _kind: CacheKind,
        _key: &ContentFingerprint,
        _value: Vec<u8>,
        _ttl: Option<Duration>,
    ) {
    }

    async fn clear(&self) {}

    async fn close(&self) {}

    async fn stats(&self) -> CacheStats {
        CacheStats {
            misses: self.misses.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use application::CachePortExt;
    use tempfile::TempDir;

    use super::*;

    fn store(limits: CacheLimits) -> (TempDir, SqliteCacheStore) {
        let dir = tempfile::tempdir().unwrap();
        let store =
            SqliteCacheStore::with_limits(&dir.path().join("cache.sqlite"), 2, limits).unwrap();
        (dir, store)
    }

    fn key(name: &str) -> ContentFingerprint {
        ContentFingerprint::builder(name).finish()
    }

    fn small(max_bytes: u64, batch: u32) -> CacheLimits {
        CacheLimits {
            max_bytes,
            eviction_batch_size: batch,
            max_eviction_batches: 1024,
        }
    }

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let (_dir, store) = store(CacheLimits::default());
        store
            .set(CacheKind::Summary, &key("a"), b"hello".to_vec(), None)
            .await;
        assert_eq!(
            store.get(CacheKind::Summary, &key("a")).await,
            Some(b"hello".to_vec())
        );
    }

    #[tokio::test]
    async fn kinds_are_separate_namespaces() {
        let (_dir, store) = store(CacheLimits::default());
        store
            .set(CacheKind::Summary, &key("a"), b"summary".to_vec(), None)
            .await;
        assert!(store.get(CacheKind::Extract, &key("a")).await.is_none());
    }

    #[tokio::test]
    async fn double_set_is_idempotent() {
        let (_dir, store) = store(CacheLimits::default());
        for _ in 0..2 {
            store
                .set(CacheKind::Extract, &key("a"), vec![7u8; 100], None)
                .await;
        }
        assert_eq!(
            store.get(CacheKind::Extract, &key("a")).await,
            Some(vec![7u8; 100])
        );
        let stats = store.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_bytes, 100);
    }

    #[tokio::test]
    async fn upsert_replaces_value_and_size() {
        let (_dir, store) = store(CacheLimits::default());
        store
            .set(CacheKind::Chat, &key("a"), vec![1u8; 10], None)
            .await;
        store
            .set(CacheKind::Chat, &key("a"), vec![2u8; 4], None)
            .await;
        assert_eq!(store.get(CacheKind::Chat, &key("a")).await, Some(vec![2u8; 4]));
        assert_eq!(store.stats().await.total_bytes, 4);
    }

    #[tokio::test]
    async fn zero_ttl_is_absent() {
        let (_dir, store) = store(CacheLimits::default());
        store
            .set(CacheKind::Summary, &key("a"), b"x".to_vec(), Some(Duration::ZERO))
            .await;
        assert!(store.get(CacheKind::Summary, &key("a")).await.is_none());
        assert_eq!(store.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn entries_expire() {
        let (_dir, store) = store(CacheLimits::default());
        store
            .set(
                CacheKind::Summary,
                &key("a"),
                b"x".to_vec(),
                Some(Duration::from_millis(200)),
            )
            .await;
        assert!(store.get(CacheKind::Summary, &key("a")).await.is_some());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(store.get(CacheKind::Summary, &key("a")).await.is_none());
    }

    #[tokio::test]
    async fn eviction_keeps_total_under_ceiling() {
        let (_dir, store) = store(small(1_000, 2));
        for i in 0..50 {
            store
                .set(CacheKind::Extract, &key(&format!("k{i}")), vec![0u8; 90], None)
                .await;
            assert!(store.stats().await.total_bytes <= 1_000);
        }
        assert!(store.get(CacheKind::Extract, &key("k49")).await.is_some());
        assert!(store.get(CacheKind::Extract, &key("k0")).await.is_none());
    }

    #[tokio::test]
    async fn eviction_prefers_least_recently_accessed() {
        let (_dir, store) = store(small(250, 1));
        store
            .set(CacheKind::Extract, &key("a"), vec![0u8; 100], None)
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store
            .set(CacheKind::Extract, &key("b"), vec![0u8; 100], None)
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.get(CacheKind::Extract, &key("a")).await.is_some());
        tokio::time::sleep(Duration::from_millis(5)).await;

        store
            .set(CacheKind::Extract, &key("c"), vec![0u8; 100], None)
            .await;
        assert!(store.get(CacheKind::Extract, &key("a")).await.is_some());
        assert!(store.get(CacheKind::Extract, &key("b")).await.is_none());
        assert!(store.get(CacheKind::Extract, &key("c")).await.is_some());
    }

    #[tokio::test]
    async fn oversized_value_is_not_stored() {
        let (_dir, store) = store(small(10, 64));
        store
            .set(CacheKind::Summary, &key("big"), vec![0u8; 11], None)
            .await;
        assert_eq!(store.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn clear_and_clear_kind() {
        let (_dir, store) = store(CacheLimits::default());
        store
            .set(CacheKind::Summary, &key("a"), b"1".to_vec(), None)
            .await;
        store
            .set(CacheKind::Extract, &key("b"), b"2".to_vec(), None)
            .await;

        store.clear_kind(CacheKind::Summary).await;
        assert!(store.get(CacheKind::Summary, &key("a")).await.is_none());
        assert!(store.get(CacheKind::Extract, &key("b")).await.is_some());

        store.clear().await;
        assert_eq!(store.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn closed_store_misses_and_ignores_writes() {
        let (_dir, store) = store(CacheLimits::default());
        store
            .set(CacheKind::Summary, &key("a"), b"1".to_vec(), None)
            .await;
        store.close().await;
        assert!(store.get(CacheKind::Summary, &key("a")).await.is_none());
        store
            .set(CacheKind::Summary, &key("b"), b"2".to_vec(), None)
            .await;
        assert_eq!(store.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        {
            let store = SqliteCacheStore::with_limits(&path, 1, CacheLimits::default()).unwrap();
            store
                .set(CacheKind::Transcript, &key("t"), b"kept".to_vec(), None)
                .await;
            store.close().await;
        }
        let store = SqliteCacheStore::with_limits(&path, 1, CacheLimits::default()).unwrap();
        assert_eq!(
            store.get(CacheKind::Transcript, &key("t")).await,
            Some(b"kept".to_vec())
        );
    }

    #[tokio::test]
    async fn stats_count_hits_and_misses() {
        let (_dir, store) = store(CacheLimits::default());
        store
            .set(CacheKind::Summary, &key("a"), b"1".to_vec(), None)
            .await;
        store.get(CacheKind::Summary, &key("a")).await;
        store.get(CacheKind::Summary, &key("missing")).await;
        let stats = store.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn json_helpers_round_trip_through_store() {
        let (_dir, store) = store(CacheLimits::default());
        store
            .set_json(CacheKind::Chat, &key("j"), &vec!["a", "b"], None)
            .await;
        let value: Option<Vec<String>> = store.get_json(CacheKind::Chat, &key("j")).await;
        assert_eq!(value, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = DisabledCache::new();
        cache
            .set(CacheKind::Summary, &key("a"), b"1".to_vec(), None)
            .await;
        assert!(cache.get(CacheKind::Summary, &key("a")).await.is_none());
        assert_eq!(cache.stats().await.misses, 1);
    }
}
