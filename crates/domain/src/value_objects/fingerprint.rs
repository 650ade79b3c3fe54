//! Content fingerprints used as cache keys
//!
//! A fingerprint is a blake3 digest over the normalized input content plus every
//! parameter that changes the produced output (model, length, language, prompt
//! template hash, ...). Bumping [`FINGERPRINT_VERSION`] invalidates all keys at once.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Version mixed into every fingerprint
pub const FINGERPRINT_VERSION: u32 = 1;

/// Hex-encoded content digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Start fingerprinting `content`
    pub fn builder(content: &str) -> FingerprintBuilder {
        FingerprintBuilder::new(content)
    }

    /// Wrap an already computed digest (e.g. read back from storage)
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The digest as lowercase hex
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental fingerprint builder
pub struct FingerprintBuilder {
    hasher: blake3::Hasher,
}

impl fmt::Debug for FingerprintBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintBuilder").finish_non_exhaustive()
    }
}

impl FingerprintBuilder {
    fn new(content: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&FINGERPRINT_VERSION.to_le_bytes());
        let normalized = normalize(content);
        hasher.update(&(normalized.len() as u64).to_le_bytes());
        hasher.update(normalized.as_bytes());
        Self { hasher }
    }

    /// Mix in a named parameter; order of calls matters
    #[must_use]
    pub fn param(mut self, name: &str, value: impl AsRef<str>) -> Self {
        let value = value.as_ref();
        // Length prefixes keep ("ab","c") and ("a","bc") apart
        self.hasher.update(&(name.len() as u64).to_le_bytes());
        self.hasher.update(name.as_bytes());
        self.hasher.update(&(value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    /// Mix in an optional parameter, distinguishing absent from empty
    #[must_use]
    pub fn opt_param(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self.param(&format!("{name}?"), ""),
        }
    }

    /// Finish and hex-encode the digest
    pub fn finish(self) -> ContentFingerprint {
        ContentFingerprint(self.hasher.finalize().to_hex().to_string())
    }
}

/// Collapse whitespace runs and trim, so reflowed text hashes the same
fn normalize(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}
