//! Value Objects - Immutable, identity-less domain primitives

mod cache_kind;
mod fingerprint;
mod session_id;
mod summary_length;

pub use cache_kind::CacheKind;
pub use fingerprint::{ContentFingerprint, FINGERPRINT_VERSION, FingerprintBuilder};
pub use session_id::SessionId;
pub use summary_length::SummaryLength;
