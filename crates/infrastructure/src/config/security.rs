//! Security configuration: the shared daemon token.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Security configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Bearer token every client must present; unset disables the daemon's API
    #[serde(default, skip_serializing)]
    pub token: Option<SecretString>,
}

impl SecurityConfig {
    /// Token value when configured and non-empty
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .filter(|t| !t.trim().is_empty())
    }
}
