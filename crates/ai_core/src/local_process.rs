//! Local CLI tool transport
//!
//! The prompt is written to the tool's stdin and its stdout is streamed back as it
//! arrives. The child is killed when the stream is dropped.

use std::{process::Stdio, time::Duration};

use futures::stream;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStdout, Command},
    task::JoinHandle,
};
use tracing::{debug, instrument, warn};

use crate::{
    config::LocalToolConfig,
    error::InferenceError,
    ports::{StreamingChunk, StreamingResponse},
};

const READ_BUFFER: usize = 4096;

/// Runs one configured CLI tool
#[derive(Debug, Clone)]
pub struct LocalProcessClient {
    name: String,
    config: LocalToolConfig,
}

struct RunState {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    pending: Vec<u8>,
    idle_timeout: Duration,
    label: String,
    saw_content: bool,
    finished: bool,
}

impl LocalProcessClient {
    pub fn new(name: impl Into<String>, config: LocalToolConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Spawn the tool and stream its output
    #[instrument(skip(self, prompt), fields(tool = %self.name, prompt_len = prompt.len()))]
    pub async fn stream(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<StreamingResponse, InferenceError> {
        let mut child = Command::new(&self.config.command)
            .args(self.config.args_for(model))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InferenceError::SpawnFailed(format!("{}: {e}", self.config.command)))?;
        debug!("Local tool spawned");

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| InferenceError::SpawnFailed("stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| InferenceError::SpawnFailed("stdout unavailable".to_string()))?;
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            })
        });

        let input = prompt.to_string();
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                warn!(error = %e, "Failed to write prompt to local tool");
            }
            // Dropping stdin closes it so the tool sees EOF
        });

        let state = RunState {
            child,
            stdout,
            stderr,
            pending: Vec::new(),
            idle_timeout: Duration::from_millis(self.config.idle_timeout_ms),
            label: self.name.clone(),
            saw_content: false,
            finished: false,
        };

        Ok(Box::pin(stream::unfold(state, next_chunk)))
    }
}

async fn next_chunk(
    mut state: RunState,
) -> Option<(Result<StreamingChunk, InferenceError>, RunState)> {
    if state.finished {
        return None;
    }
    let mut buf = [0u8; READ_BUFFER];
    loop {
        let read = tokio::time::timeout(state.idle_timeout, state.stdout.read(&mut buf)).await;
        let n = match read {
            Err(_) => {
                state.finished = true;
                let _ = state.child.start_kill();
                #[allow(clippy::cast_possible_truncation)]
                let ms = state.idle_timeout.as_millis() as u64;
                return Some((Err(InferenceError::Timeout(ms)), state));
            },
            Ok(Err(e)) => {
                state.finished = true;
                return Some((Err(InferenceError::StreamError(e.to_string())), state));
            },
            Ok(Ok(n)) => n,
        };

        if n == 0 {
            state.finished = true;
            return Some((finish(&mut state).await, state));
        }

        state.pending.extend_from_slice(&buf[..n]);
        let text = take_valid_utf8(&mut state.pending);
        if !text.is_empty() {
            state.saw_content |= !text.trim().is_empty();
            return Some((Ok(StreamingChunk::content(text)), state));
        }
    }
}

/// Wait for exit and turn the outcome into the final item
async fn finish(state: &mut RunState) -> Result<StreamingChunk, InferenceError> {
    let status = state
        .child
        .wait()
        .await
        .map_err(|e| InferenceError::ProcessFailed(e.to_string()))?;
    let stderr = match state.stderr.take() {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };

    if !status.success() {
        let detail = stderr.trim();
        return Err(InferenceError::ProcessFailed(if detail.is_empty() {
            format!("{} exited with {status}", state.label)
        } else {
            format!("{} exited with {status}: {detail}", state.label)
        }));
    }
    // Trailing bytes that never formed valid UTF-8
    if !state.pending.is_empty() {
        let rest = String::from_utf8_lossy(&state.pending).into_owned();
        state.pending.clear();
        state.saw_content |= !rest.trim().is_empty();
        if state.saw_content {
            return Ok(StreamingChunk {
                content: rest,
                done: true,
            });
        }
    }
    if !state.saw_content {
        return Err(InferenceError::EmptyOutput(state.label.clone()));
    }
    Ok(StreamingChunk::done())
}

/// Split off the longest valid UTF-8 prefix, keeping an incomplete tail
fn take_valid_utf8(pending: &mut Vec<u8>) -> String {
    let valid = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        // Invalid sequence in the middle: replace it rather than stall
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            return text;
        },
    };
    let rest = pending.split_off(valid);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = rest;
    text
}
