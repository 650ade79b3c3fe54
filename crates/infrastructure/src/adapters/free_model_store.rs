//! JSON file holding the free models that passed the last probe

use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use application::{error::ApplicationError, ports::FreeModelStorePort};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

#[derive(Debug, Default, Serialize, Deserialize)]
struct FreeModelFile {
    #[serde(default)]
    models: Vec<String>,
    /// Unix seconds of the last save
    #[serde(default)]
    saved_at: u64,
}

/// File-backed free-model list
#[derive(Debug, Clone)]
pub struct JsonFreeModelStore {
    path: PathBuf,
}

impl JsonFreeModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> ApplicationError {
    ApplicationError::Internal(format!("{}: {e}", path.display()))
}

#[async_trait]
impl FreeModelStorePort for JsonFreeModelStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Vec<String>, ApplicationError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No saved free models");
                return Ok(Vec::new());
            },
            Err(e) => return Err(io_error(&self.path, &e)),
        };
        let file: FreeModelFile = serde_json::from_slice(&bytes).map_err(|e| {
            ApplicationError::Internal(format!("{}: {e}", self.path.display()))
        })?;
        Ok(file.models)
    }

    #[instrument(skip(self, models), fields(path = %self.path.display(), count = models.len()))]
    async fn save(&self, models: &[String]) -> Result<(), ApplicationError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, &e))?;
        }
        let file = FreeModelFile {
            models: models.to_vec(),
            saved_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| ApplicationError::Internal(e.to_string()))?;

        // Write-then-rename so readers never see a partial file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| io_error(&tmp, &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, &e))?;
        info!("Saved free models");
        Ok(())
    }
}
