//! Domain layer for the summarize daemon
//!
//! Contains the vocabulary shared by every other crate: session identifiers,
//! stream events, model attempts, cache kinds and content fingerprints.
//! This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
