//! Environment-based credential adapter
//!
//! Provider API keys are read from environment variables named exactly like the
//! credential, e.g. `OPENAI_API_KEY`. Blank values count as unset.

use std::{collections::HashMap, env};

use application::ports::CredentialPort;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

/// Credential lookup backed by the process environment
#[derive(Default)]
pub struct EnvCredentials {
    /// Values that take precedence over the environment
    fixed: HashMap<String, SecretString>,
    read_env: bool,
}

impl std::fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.fixed.keys().collect();
        names.sort();
        f.debug_struct("EnvCredentials")
            .field("fixed", &names)
            .field("read_env", &self.read_env)
            .finish()
    }
}

impl EnvCredentials {
    /// Read credentials from the environment
    pub fn new() -> Self {
        Self {
            fixed: HashMap::new(),
            read_env: true,
        }
    }

    /// Only the given values, ignoring the environment
    pub fn from_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fixed: values
                .into_iter()
                .map(|(k, v)| (k.into(), SecretString::from(v.into())))
                .collect(),
            read_env: false,
        }
    }
}

impl CredentialPort for EnvCredentials {
    fn get(&self, name: &str) -> Option<String> {
        if let Some(value) = self.fixed.get(name) {
            return Some(value.expose_secret().trim().to_string()).filter(|v| !v.is_empty());
        }
        if !self.read_env {
            return None;
        }
        match env::var(name) {
            Ok(value) => {
                let value = value.trim().to_string();
                if value.is_empty() {
                    debug!(credential = %name, "Credential is blank");
                    None
                } else {
                    Some(value)
                }
            },
            Err(env::VarError::NotPresent) => None,
            Err(env::VarError::NotUnicode(_)) => {
                warn!(credential = %name, "Credential contains invalid UTF-8");
                None
            },
        }
    }
}
