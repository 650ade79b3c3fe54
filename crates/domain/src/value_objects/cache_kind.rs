//! Cache partitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Partition of the cache store; `(kind, key)` identifies an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// Extracted page or document content
    Extract,
    /// Finished summaries
    Summary,
    /// Audio/video transcripts
    Transcript,
    /// Follow-up chat answers
    Chat,
}

impl CacheKind {
    /// All kinds, in storage order
    pub const ALL: [Self; 4] = [Self::Extract, Self::Summary, Self::Transcript, Self::Chat];

    /// Column value used by the store
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Summary => "summary",
            Self::Transcript => "transcript",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extract" => Ok(Self::Extract),
            "summary" => Ok(Self::Summary),
            "transcript" => Ok(Self::Transcript),
            "chat" => Ok(Self::Chat),
            other => Err(DomainError::UnknownCacheKind(other.to_string())),
        }
    }
}
