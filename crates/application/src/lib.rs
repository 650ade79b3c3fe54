//! Application layer - Use cases and orchestration
//!
//! Owns the session registry, the model attempt runner and the summarize /
//! refresh-free use cases. Talks to the outside world only through the ports
//! defined in [`ports`].

pub mod error;
pub mod ports;
pub mod services;

pub use error::{ApplicationError, FailureClass};
pub use ports::*;
pub use services::*;
