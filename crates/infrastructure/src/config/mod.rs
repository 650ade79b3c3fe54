//! Application configuration
//!
//! Split into focused sub-modules:
//! - `server`: HTTP server settings
//! - `security`: daemon token
//! - `cache`: SQLite cache store and TTLs
//! - `sessions`: replay buffer caps and timers
//! - `models`: model selection, provider endpoints, local tools, free-model refresh
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file
//! (`config.toml`, or the path in `SUMMARIZE_CONFIG`), then environment variables
//! such as `SUMMARIZE_SERVER__PORT=9000`.

mod cache;
mod models;
mod security;
mod server;
mod sessions;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use cache::CacheConfig;
pub use models::{
    CliToolsConfig, ExtractConfig, ModelsConfig, ProviderUrls, RefreshFreeAppConfig,
    default_cli_tools,
};
pub use security::SecurityConfig;
pub use server::ServerConfig;
pub use sessions::SessionsConfig;

use crate::retry::RetryConfig;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "SUMMARIZE_CONFIG";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SUMMARIZE";

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Directory holding the cache database and the free-model list
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".summarize")
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    /// Retry policy for opening model streams
    #[serde(default)]
    pub retry: RetryConfig,

    /// Local CLI tools, merged over the built-in definitions
    #[serde(default)]
    pub cli: CliToolsConfig,

    #[serde(default)]
    pub refresh_free: RefreshFreeAppConfig,

    #[serde(default)]
    pub extract: ExtractConfig,
}

impl AppConfig {
    /// Load configuration from the optional file and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let file = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config".to_string());
        debug!(file = %file, "Loading configuration");
        Self::load_from(&file)
    }

    /// Load with an explicit file name (extension optional, file may be absent)
    pub fn load_from(file: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            // e.g. SUMMARIZE_SERVER__PORT, SUMMARIZE_MODELS__AUTO=a,b
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("models.auto")
                    .with_list_parse_key("models.aggregator_provider_order")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Built-in CLI tools with configured entries replacing them by name
    pub fn cli_tools(&self) -> CliToolsConfig {
        let mut tools = default_cli_tools();
        tools.extend(self.cli.clone());
        tools
    }
}
