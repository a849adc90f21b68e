use std::path::{Path, PathBuf};

use crate::error::{GatewayError, Result};
use crate::models::PersistedTopology;

/// Reads and writes the single persisted topology file.
pub struct TopologyStore {
    state_file_path: PathBuf,
}

impl TopologyStore {
    pub fn new(state_file_path: impl Into<PathBuf>) -> Self {
        Self {
            state_file_path: state_file_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.state_file_path
    }

    /// `None` when there is no session on record (missing or empty file).
    pub async fn load(&self) -> Result<Option<PersistedTopology>> {
        if !self.state_file_path.exists() {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(&self.state_file_path)
            .await
            .map_err(|e| GatewayError::State(format!("failed to read state file: {e}")))?;
        if json.trim().is_empty() {
            return Ok(None);
        }
        let topology: PersistedTopology = serde_json::from_str(&json)?;
        Ok(Some(topology))
    }

    pub async fn save(&self, topology: &PersistedTopology) -> Result<()> {
        if let Some(parent) = self.state_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    GatewayError::State(format!("failed to create state dir: {e}"))
                })?;
            }
        }
        let json = serde_json::to_string_pretty(topology)?;
        tokio::fs::write(&self.state_file_path, json)
            .await
            .map_err(|e| GatewayError::State(format!("failed to write state file: {e}")))?;
        Ok(())
    }

    /// Delete the file. Already gone is fine.
    pub async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.state_file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GatewayError::State(format!(
                "failed to remove state file: {e}"
            ))),
        }
    }
}
