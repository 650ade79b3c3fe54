//! Events streamed to session subscribers
//!
//! The wire form of each event is an `event:` line naming the variant and a single
//! `data:` line holding the JSON payload. `Done` and `Error` are terminal.

use serde::{Deserialize, Serialize};

/// Latest-known summary metadata for a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaPayload {
    /// Model chosen for the run, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Title of the source, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Characters of input fed to the model
    pub input_chars: usize,
    /// Whether the input was cut to fit the character budget
    pub truncated: bool,
    /// Whether the summary is served from cache
    pub cached: bool,
}

/// Human-readable progress line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub text: String,
}

/// A piece of model output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub text: String,
}

/// Run statistics, sent once before `done`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPayload {
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub input_chars: usize,
    pub output_chars: usize,
    pub attempts: usize,
}

/// Successful completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub cached: bool,
}

/// Failed completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Closed set of session events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum SseEvent {
    Meta(MetaPayload),
    Status(StatusPayload),
    Chunk(ChunkPayload),
    Metrics(MetricsPayload),
    Done(DonePayload),
    Error(ErrorPayload),
}

/// Bytes added around name and data by the wire framing
const FRAME_OVERHEAD: usize = "event: \ndata: \n\n".len();

impl SseEvent {
    /// Progress line
    pub fn status(text: impl Into<String>) -> Self {
        Self::Status(StatusPayload { text: text.into() })
    }

    /// Output chunk
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk(ChunkPayload { text: text.into() })
    }

    /// Terminal failure
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Value of the `event:` line
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Meta(_) => "meta",
            Self::Status(_) => "status",
            Self::Chunk(_) => "chunk",
            Self::Metrics(_) => "metrics",
            Self::Done(_) => "done",
            Self::Error(_) => "error",
        }
    }

    /// `done` and `error` end the stream
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Error(_))
    }

    /// Payload as single-line JSON
    pub fn data_json(&self) -> String {
        let encoded = match self {
            Self::Meta(p) => serde_json::to_string(p),
            Self::Status(p) => serde_json::to_string(p),
            Self::Chunk(p) => serde_json::to_string(p),
            Self::Metrics(p) => serde_json::to_string(p),
            Self::Done(p) => serde_json::to_string(p),
            Self::Error(p) => serde_json::to_string(p),
        };
        // Payloads are plain structs of strings and numbers
        encoded.unwrap_or_else(|_| "{}".to_string())
    }

    /// Size of the wire record in bytes, used for buffer accounting
    pub fn encoded_len(&self) -> usize {
        self.event_name().len() + self.data_json().len() + FRAME_OVERHEAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_variants() {
        assert!(SseEvent::Done(DonePayload::default()).is_terminal());
        assert!(SseEvent::error("boom").is_terminal());
        assert!(!SseEvent::chunk("x").is_terminal());
        assert!(!SseEvent::status("x").is_terminal());
        assert!(!SseEvent::Meta(MetaPayload::default()).is_terminal());
    }

    #[test]
    fn data_stays_on_one_line() {
        let data = SseEvent::chunk("line one\nline two").data_json();
        assert_eq!(data, "{\"text\":\"line one\\nline two\"}");
        assert!(!data.contains('\n'));
    }

    #[test]
    fn encoded_len_matches_wire() {
        let event = SseEvent::Metrics(MetricsPayload {
            elapsed_ms: 12,
            model: Some("m".to_string()),
            input_chars: 10,
            output_chars: 20,
            attempts: 1,
        });
        let framed = format!("event: {}\ndata: {}\n\n", event.event_name(), event.data_json());
        assert_eq!(event.encoded_len(), framed.len());
    }

    #[test]
    fn meta_uses_camel_case() {
        let event = SseEvent::Meta(MetaPayload {
            input_chars: 5,
            ..MetaPayload::default()
        });
        let json = event.data_json();
        assert!(json.contains("\"inputChars\":5"));
        assert!(!json.contains("model"));
    }

    #[test]
    fn tagged_serde_roundtrip() {
        let event = SseEvent::status("Fetching");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"status","data":{"text":"Fetching"}}"#);
        let back: SseEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
