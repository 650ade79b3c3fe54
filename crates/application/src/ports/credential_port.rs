//! Credential lookup port

#[cfg(test)]
use mockall::automock;

/// Resolves named credentials (API keys) from the runtime environment
#[cfg_attr(test, automock)]
pub trait CredentialPort: Send + Sync {
    /// Value of the credential, if configured and non-empty
    fn get(&self, name: &str) -> Option<String>;

    /// Whether the credential is configured
    fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}
