//! Server-sent event parsing for OpenAI-compatible streams

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bytes::Bytes;
use futures::{
    Stream,
    future,
    stream::{self, StreamExt},
};
use serde::Deserialize;
use tracing::trace;

use crate::{
    error::InferenceError,
    ports::{StreamingChunk, StreamingResponse},
};

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    delta: Option<CompletionDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    #[serde(default)]
    message: String,
}

/// Incremental decoder for `data:` lines
///
/// Network reads split lines arbitrarily, so incomplete trailing bytes are held
/// until the next read completes them.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `[DONE]` was seen
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed a read and return the chunks it completed
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<StreamingChunk, InferenceError>> {
        self.pending.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(item) = self.decode_line(&line) {
                out.push(item);
            }
        }
        out
    }

    /// Flush a final unterminated line
    pub fn finish(&mut self) -> Vec<Result<StreamingChunk, InferenceError>> {
        let line = std::mem::take(&mut self.pending);
        self.decode_line(&line).into_iter().collect()
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<Result<StreamingChunk, InferenceError>> {
        if self.finished {
            return None;
        }
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim_end_matches(['\r', '\n']),
            Err(e) => {
                return Some(Err(InferenceError::InvalidResponse(format!(
                    "Invalid UTF-8: {e}"
                ))));
            },
        };
        // Blank separators, comments (keepalives) and other fields carry no content
        let data = line.strip_prefix("data:")?.trim_start();
        trace!(line = %data, "Parsing stream chunk");

        if data == "[DONE]" {
            self.finished = true;
            return Some(Ok(StreamingChunk::done()));
        }

        let chunk: CompletionChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                return Some(Err(InferenceError::InvalidResponse(format!(
                    "JSON parse error: {e}"
                ))));
            },
        };
        if let Some(error) = chunk.error {
            return Some(Err(InferenceError::StreamError(error.message)));
        }

        let mut content = String::new();
        let mut done = false;
        for choice in chunk.choices {
            if let Some(text) = choice.delta.and_then(|d| d.content) {
                content.push_str(&text);
            }
            done |= choice.finish_reason.is_some();
        }
        Some(Ok(StreamingChunk { content, done }))
    }
}

/// Turn a byte stream into content chunks, failing with `EmptyOutput` when the
/// stream ends without any content
pub fn decode_stream<S>(bytes: S, model: String) -> StreamingResponse
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let saw_content = Arc::new(AtomicBool::new(false));
    let mut decoder = SseDecoder::new();

    let seen = Arc::clone(&saw_content);
    let chunks = bytes
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .map(move |read| match read {
            Some(Ok(bytes)) => decoder.feed(&bytes),
            Some(Err(e)) => vec![Err(InferenceError::StreamError(e.to_string()))],
            None => decoder.finish(),
        })
        .flat_map(stream::iter)
        .inspect(move |item| {
            if matches!(item, Ok(chunk) if !chunk.content.is_empty()) {
                seen.store(true, Ordering::Relaxed);
            }
        });

    let tail = stream::once(future::lazy(move |_| {
        (!saw_content.load(Ordering::Relaxed)).then(|| Err(InferenceError::EmptyOutput(model)))
    }))
    .filter_map(future::ready);

    Box::pin(chunks.chain(tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(items: Vec<Result<StreamingChunk, InferenceError>>) -> Vec<String> {
        items
            .into_iter()
            .map(|item| item.unwrap().content)
            .collect()
    }

    #[test]
    fn parses_content_deltas() {
        let mut decoder = SseDecoder::new();
        let items = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        );
        assert_eq!(contents(items), vec!["Hel", "lo"]);
    }

    #[test]
    fn holds_partial_lines_until_complete() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"choices\":[{\"delta\":").is_empty());
        let items = decoder.feed(b"{\"content\":\"x\"}}]}\n");
        assert_eq!(contents(items), vec!["x"]);
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b": OPENROUTER PROCESSING\n\nevent: ping\n").is_empty());
    }

    #[test]
    fn done_marker_finishes() {
        let mut decoder = SseDecoder::new();
        let items = decoder.feed(b"data: [DONE]\n\ndata: {\"choices\":[]}\n");
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap().done);
        assert!(decoder.is_finished());
    }

    #[test]
    fn error_payload_becomes_stream_error() {
        let mut decoder = SseDecoder::new();
        let items = decoder.feed(b"data: {\"error\":{\"message\":\"overloaded\"}}\n");
        assert!(matches!(&items[0], Err(InferenceError::StreamError(m)) if m == "overloaded"));
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"z\"}}]}").is_empty());
        assert_eq!(contents(decoder.finish()), vec!["z"]);
    }

    #[tokio::test]
    async fn empty_stream_reports_empty_output() {
        let body: Vec<Result<Bytes, reqwest::Error>> = vec![Ok(Bytes::from_static(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\ndata: [DONE]\n\n",
        ))];
        let items: Vec<_> = decode_stream(stream::iter(body), "m".to_string())
            .collect()
            .await;
        assert!(matches!(items.last(), Some(Err(InferenceError::EmptyOutput(m))) if m == "m"));
    }

    #[tokio::test]
    async fn non_empty_stream_has_no_tail_error() {
        let body: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"con")),
            Ok(Bytes::from_static(b"tent\":\"ok\"}}]}\n\ndata: [DONE]\n\n")),
        ];
        let items: Vec<_> = decode_stream(stream::iter(body), "m".to_string())
            .collect()
            .await;
        assert!(items.iter().all(Result::is_ok));
        let text: String = items.into_iter().map(|i| i.unwrap().content).collect();
        assert_eq!(text, "ok");
    }
}
