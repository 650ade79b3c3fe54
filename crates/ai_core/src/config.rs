//! Transport configuration

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Configuration of one OpenAI-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatConfig {
    /// Base URL including the version segment, e.g. `https://api.openai.com/v1`
    pub base_url: String,

    /// Request timeout in milliseconds, covering the whole stream
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Extra headers sent with every request (aggregator attribution etc.)
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

const fn default_timeout_ms() -> u64 {
    120_000
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl OpenAiCompatConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            extra_headers: HashMap::new(),
        }
    }

    pub fn openai() -> Self {
        Self::new("https://api.openai.com/v1")
    }

    /// Anthropic's OpenAI-compatible surface
    pub fn anthropic() -> Self {
        Self::new("https://api.anthropic.com/v1")
    }

    /// Gemini's OpenAI-compatible surface
    pub fn google() -> Self {
        Self::new("https://generativelanguage.googleapis.com/v1beta/openai")
    }

    pub fn xai() -> Self {
        Self::new("https://api.x.ai/v1")
    }

    pub fn openrouter() -> Self {
        Self::new("https://openrouter.ai/api/v1")
    }
}

/// A locally installed CLI tool that reads a prompt on stdin and writes text to stdout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalToolConfig {
    /// Executable name or path
    pub command: String,

    /// Fixed arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Flag placed before the model name when one is requested, e.g. `--model`
    #[serde(default)]
    pub model_flag: Option<String>,

    /// Longest silence on stdout before the run is abandoned, in milliseconds
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

const fn default_idle_timeout_ms() -> u64 {
    180_000
}

impl LocalToolConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            model_flag: None,
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }

    /// Arguments for one run, with the model appended when both are known
    pub fn args_for(&self, model: Option<&str>) -> Vec<String> {
        let mut args = self.args.clone();
        if let (Some(flag), Some(model)) = (&self.model_flag, model) {
            args.push(flag.clone());
            args.push(model.to_string());
        }
        args
    }
}
