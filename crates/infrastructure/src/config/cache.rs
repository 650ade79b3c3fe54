//! Cache store configuration.

use std::{path::PathBuf, time::Duration};

use domain::CacheKind;
use serde::{Deserialize, Serialize};

use super::{data_dir, default_true};

/// Cache configuration with TTL settings per cache kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether caching is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SQLite file; defaults to `~/.summarize/cache.sqlite`
    #[serde(default)]
    pub path: Option<String>,

    /// Ceiling on the sum of stored value sizes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Rows deleted per eviction batch
    #[serde(default = "default_eviction_batch_size")]
    pub eviction_batch_size: u32,

    /// Upper bound on batches per eviction pass
    #[serde(default = "default_max_eviction_batches")]
    pub max_eviction_batches: u32,

    /// Pooled read connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// TTL for extracted content in seconds; unset never expires
    #[serde(default = "default_ttl_extract")]
    pub ttl_extract_secs: Option<u64>,

    /// TTL for summaries in seconds
    #[serde(default = "default_ttl_summary")]
    pub ttl_summary_secs: Option<u64>,

    /// TTL for transcripts in seconds
    #[serde(default = "default_ttl_transcript")]
    pub ttl_transcript_secs: Option<u64>,

    /// TTL for chat answers in seconds
    #[serde(default = "default_ttl_chat")]
    pub ttl_chat_secs: Option<u64>,
}

const fn default_max_bytes() -> u64 {
    512 * 1024 * 1024
}

const fn default_eviction_batch_size() -> u32 {
    64
}

const fn default_max_eviction_batches() -> u32 {
    1024
}

const fn default_max_connections() -> u32 {
    4
}

#[allow(clippy::unnecessary_wraps)]
const fn default_ttl_extract() -> Option<u64> {
    Some(7 * 24 * 60 * 60)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_ttl_summary() -> Option<u64> {
    Some(30 * 24 * 60 * 60)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_ttl_transcript() -> Option<u64> {
    Some(30 * 24 * 60 * 60)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_ttl_chat() -> Option<u64> {
    Some(24 * 60 * 60)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            max_bytes: default_max_bytes(),
            eviction_batch_size: default_eviction_batch_size(),
            max_eviction_batches: default_max_eviction_batches(),
            max_connections: default_max_connections(),
            ttl_extract_secs: default_ttl_extract(),
            ttl_summary_secs: default_ttl_summary(),
            ttl_transcript_secs: default_ttl_transcript(),
            ttl_chat_secs: default_ttl_chat(),
        }
    }
}

impl CacheConfig {
    /// Resolved database path
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .as_ref()
            .map_or_else(|| data_dir().join("cache.sqlite"), PathBuf::from)
    }

    /// TTL for `kind`; `None` never expires
    pub fn ttl(&self, kind: CacheKind) -> Option<Duration> {
        let secs = match kind {
            CacheKind::Extract => self.ttl_extract_secs,
            CacheKind::Summary => self.ttl_summary_secs,
            CacheKind::Transcript => self.ttl_transcript_secs,
            CacheKind::Chat => self.ttl_chat_secs,
        };
        secs.map(Duration::from_secs)
    }
}
