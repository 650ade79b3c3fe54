//! Hand-written port doubles shared by the service tests

use std::{collections::HashMap, collections::HashSet, time::Duration};

use async_trait::async_trait;
use domain::{CacheKind, ContentFingerprint, ModelAttempt};
use futures::stream;
use parking_lot::Mutex;

use crate::{
    error::ApplicationError,
    ports::{CachePort, CacheStats, CredentialPort, ModelExecutorPort, ModelPrompt, OutputStream},
};

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(CacheKind, String), Vec<u8>>>,
}

impl MemoryCache {
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[async_trait]
impl CachePort for MemoryCache {
    async fn get(&self, kind: CacheKind, key: &ContentFingerprint) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .get(&(kind, key.as_str().to_string()))
            .cloned()
    }

    async fn set(
        &self,
        kind: CacheKind,
        key: &ContentFingerprint,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) {
        if ttl == Some(Duration::ZERO) {
            return;
        }
        self.entries
            .lock()
            .insert((kind, key.as_str().to_string()), value);
    }

    async fn clear(&self) {
        self.entries.lock().clear();
    }

    async fn close(&self) {}

    async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.lock().len() as u64,
            ..CacheStats::default()
        }
    }
}

pub struct Keys(pub HashSet<&'static str>);

impl Keys {
    pub fn with(names: &[&'static str]) -> Self {
        Self(names.iter().copied().collect())
    }
}

impl CredentialPort for Keys {
    fn get(&self, name: &str) -> Option<String> {
        self.0.contains(name).then(|| "test-key".to_string())
    }
}

/// What a scripted model does when executed
pub enum Script {
    /// Stream these chunks and finish
    Chunks(Vec<&'static str>),
    /// Fail before producing anything
    Fail(fn() -> ApplicationError),
    /// Stream these chunks, then fail
    FailAfter(Vec<&'static str>, fn() -> ApplicationError),
}

/// Executor answering per user-facing model id
#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    #[must_use]
    pub fn with(mut self, model: &str, script: Script) -> Self {
        self.scripts.insert(model.to_string(), script);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ModelExecutorPort for ScriptedExecutor {
    async fn open_stream(
        &self,
        attempt: &ModelAttempt,
        _prompt: &ModelPrompt,
    ) -> Result<OutputStream, ApplicationError> {
        let model = attempt.user_facing_model_id.clone();
        self.calls.lock().push(model.clone());
        match self.scripts.get(&model) {
            Some(Script::Chunks(chunks)) => {
                let items: Vec<Result<String, ApplicationError>> =
                    chunks.iter().map(|c| Ok((*c).to_string())).collect();
                Ok(Box::pin(stream::iter(items)))
            },
            Some(Script::Fail(make)) => Err(make()),
            Some(Script::FailAfter(chunks, make)) => {
                let mut items: Vec<Result<String, ApplicationError>> =
                    chunks.iter().map(|c| Ok((*c).to_string())).collect();
                items.push(Err(make()));
                Ok(Box::pin(stream::iter(items)))
            },
            None => Err(ApplicationError::InvalidRequest(format!(
                "no script for {model}"
            ))),
        }
    }
}
