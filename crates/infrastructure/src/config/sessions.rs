//! Session registry limits and timers.

use std::time::Duration;

use application::SessionRegistryConfig;
use serde::{Deserialize, Serialize};

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_max_buffered_events")]
    pub max_buffered_events: usize,

    #[serde(default = "default_max_buffered_bytes")]
    pub max_buffered_bytes: usize,

    /// Seconds a finished session remains attachable
    #[serde(default = "default_grace")]
    pub grace_secs: u64,

    /// Seconds after which a session that never finished is dropped
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,

    /// Seconds between sweeps of expired sessions
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Seconds between keepalive comments on event streams
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
}

const fn default_max_buffered_events() -> usize {
    2_000
}

const fn default_max_buffered_bytes() -> usize {
    4 * 1024 * 1024
}

const fn default_grace() -> u64 {
    30
}

const fn default_max_age() -> u64 {
    30 * 60
}

const fn default_sweep_interval() -> u64 {
    10
}

const fn default_keepalive() -> u64 {
    15
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_buffered_events: default_max_buffered_events(),
            max_buffered_bytes: default_max_buffered_bytes(),
            grace_secs: default_grace(),
            max_age_secs: default_max_age(),
            sweep_interval_secs: default_sweep_interval(),
            keepalive_secs: default_keepalive(),
        }
    }
}

impl SessionsConfig {
    pub fn registry_config(&self) -> SessionRegistryConfig {
        SessionRegistryConfig {
            max_buffered_events: self.max_buffered_events.max(1),
            max_buffered_bytes: self.max_buffered_bytes,
            grace: Duration::from_secs(self.grace_secs),
            max_age: Duration::from_secs(self.max_age_secs.max(1)),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.max(1))
    }
}
