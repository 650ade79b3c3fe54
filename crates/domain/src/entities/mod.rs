//! Domain entities - stream events and model attempts

mod model_attempt;
mod sse_event;

pub use model_attempt::{ModelAttempt, ProviderConstraints, Transport};
pub use sse_event::{
    ChunkPayload, DonePayload, ErrorPayload, MetaPayload, MetricsPayload, SseEvent, StatusPayload,
};
