//! JSON state file on local disk

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use hwcloud_provider::types::StateFile;

const MAX_STATE_FILE_SIZE: u64 = 50 * 1024 * 1024; // 50MB

/// Reads and writes the state file at one path.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state; a missing file is an empty state.
    pub async fn load(&self) -> Result<StateFile> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            tracing::debug!("state file {} does not exist yet", self.path.display());
            return Ok(StateFile::default());
        }

        let metadata = tokio::fs::metadata(&self.path)
            .await
            .with_context(|| format!("failed to read metadata of {}", self.path.display()))?;
        if metadata.len() > MAX_STATE_FILE_SIZE {
            bail!(
                "state file too large: {} bytes (max: {MAX_STATE_FILE_SIZE} bytes)",
                metadata.len()
            );
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read state file {}", self.path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("invalid state file {}", self.path.display()))
    }

    /// Write the state through a temporary file so a crash never leaves a torn file.
    pub async fn save(&self, state: &StateFile) -> Result<()> {
        let content = serde_json::to_string_pretty(state).context("failed to serialize state")?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, content)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace state file {}", self.path.display()))?;
        tracing::debug!("state saved (serial {})", state.serial);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hwcloud_provider::types::{ResourceMode, ResourceState};
    use serde_json::Map;
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn missing_file_loads_empty_state() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("none.json"));
        let state = store.load().await.unwrap();
        assert!(state.resources.is_empty());
        assert_eq!(state.serial, 0);
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("hwcloud.tfstate.json"));

        let mut state = StateFile::default();
        state.upsert(ResourceState {
            mode: ResourceMode::Managed,
            type_name: "huaweicloud_vpc".into(),
            name: "main".into(),
            id: "vpc-1".into(),
            attributes: Map::new(),
        });
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, state);
        assert!(!dir.path().join("hwcloud.tfstate.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(StateStore::new(path).load().await.is_err());
    }
}
