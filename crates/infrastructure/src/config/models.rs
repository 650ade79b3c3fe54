//! Model selection, provider endpoints, local tools and the free-model refresh.

use std::{collections::HashMap, path::PathBuf, time::Duration};

use ai_core::{LocalToolConfig, OpenAiCompatConfig};
use application::{AttemptPlannerConfig, DEFAULT_MAX_OUTPUT_TOKENS, RefreshFreeConfig};
use serde::{Deserialize, Serialize};

use super::data_dir;

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Candidates tried for `auto`, in order
    #[serde(default = "default_auto")]
    pub auto: Vec<String>,

    /// Retry each direct model through the aggregator
    #[serde(default)]
    pub aggregator_fallback: bool,

    /// Upstream providers the aggregator should prefer
    #[serde(default)]
    pub aggregator_provider_order: Vec<String>,

    /// Per-request timeout in seconds, covering the whole stream
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Cap on tokens requested from a backend
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default)]
    pub providers: ProviderUrls,
}

fn default_auto() -> Vec<String> {
    AttemptPlannerConfig::default().auto
}

const fn default_timeout() -> u64 {
    120
}

const fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            auto: default_auto(),
            aggregator_fallback: false,
            aggregator_provider_order: Vec::new(),
            timeout_secs: default_timeout(),
            max_output_tokens: default_max_output_tokens(),
            providers: ProviderUrls::default(),
        }
    }
}

impl ModelsConfig {
    pub fn planner_config(&self) -> AttemptPlannerConfig {
        AttemptPlannerConfig {
            auto: self.auto.clone(),
            aggregator_fallback: self.aggregator_fallback,
            aggregator_provider_order: self.aggregator_provider_order.clone(),
        }
    }

    /// Client configuration for a base URL with this section's timeout
    pub fn endpoint(&self, base_url: &str) -> OpenAiCompatConfig {
        let mut config = OpenAiCompatConfig::new(base_url);
        config.timeout_ms = self.timeout_secs.saturating_mul(1000);
        config
    }
}

/// Base URLs of the OpenAI-compatible endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUrls {
    #[serde(default = "default_openai")]
    pub openai: String,
    #[serde(default = "default_anthropic")]
    pub anthropic: String,
    #[serde(default = "default_google")]
    pub google: String,
    #[serde(default = "default_xai")]
    pub xai: String,
    #[serde(default = "default_openrouter")]
    pub openrouter: String,
}

fn default_openai() -> String {
    OpenAiCompatConfig::openai().base_url
}

fn default_anthropic() -> String {
    OpenAiCompatConfig::anthropic().base_url
}

fn default_google() -> String {
    OpenAiCompatConfig::google().base_url
}

fn default_xai() -> String {
    OpenAiCompatConfig::xai().base_url
}

fn default_openrouter() -> String {
    OpenAiCompatConfig::openrouter().base_url
}

impl Default for ProviderUrls {
    fn default() -> Self {
        Self {
            openai: default_openai(),
            anthropic: default_anthropic(),
            google: default_google(),
            xai: default_xai(),
            openrouter: default_openrouter(),
        }
    }
}

impl ProviderUrls {
    /// Base URL of a direct provider
    pub fn for_provider(&self, provider: &str) -> Option<&str> {
        match provider {
            "openai" => Some(&self.openai),
            "anthropic" => Some(&self.anthropic),
            "google" => Some(&self.google),
            "xai" => Some(&self.xai),
            _ => None,
        }
    }
}

/// Local CLI tools keyed by the name used in `cli/<name>`
pub type CliToolsConfig = HashMap<String, LocalToolConfig>;

/// Built-in tool definitions, overridable per name
pub fn default_cli_tools() -> CliToolsConfig {
    let mut tools = HashMap::new();
    let mut claude = LocalToolConfig::new("claude");
    claude.args = vec!["-p".to_string()];
    claude.model_flag = Some("--model".to_string());
    tools.insert("claude".to_string(), claude);

    let mut codex = LocalToolConfig::new("codex");
    codex.args = vec!["exec".to_string(), "-".to_string()];
    codex.model_flag = Some("-m".to_string());
    tools.insert("codex".to_string(), codex);

    let mut gemini = LocalToolConfig::new("gemini");
    gemini.model_flag = Some("--model".to_string());
    tools.insert("gemini".to_string(), gemini);
    tools
}

/// Free-model refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshFreeAppConfig {
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// JSON file holding the working free models; defaults to `~/.summarize/free-models.json`
    #[serde(default)]
    pub store_path: Option<String>,
}

const fn default_max_candidates() -> usize {
    12
}

const fn default_probe_timeout() -> u64 {
    20
}

impl Default for RefreshFreeAppConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            probe_timeout_secs: default_probe_timeout(),
            store_path: None,
        }
    }
}

impl RefreshFreeAppConfig {
    pub fn service_config(&self) -> RefreshFreeConfig {
        RefreshFreeConfig {
            max_candidates: self.max_candidates,
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
        }
    }

    pub fn resolved_store_path(&self) -> PathBuf {
        self.store_path
            .as_ref()
            .map_or_else(|| data_dir().join("free-models.json"), PathBuf::from)
    }
}

/// Content extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_extract_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Column width used when rendering HTML to text
    #[serde(default = "default_text_width")]
    pub text_width: usize,
}

const fn default_extract_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("summarize-daemon/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_text_width() -> usize {
    120
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_extract_timeout(),
            user_agent: default_user_agent(),
            text_width: default_text_width(),
        }
    }
}
