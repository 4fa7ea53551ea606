//! the blob storage contract used to off-load session recordings.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_types::StorageConfig;

use crate::Result;
use crate::error::Error;

/// stores and fetches files by key.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// upload the file at `local` under `key`.
    async fn push(&self, key: &str, local: &Path) -> Result<()>;

    /// download `key` into `local`.
    async fn get(&self, key: &str, local: &Path) -> Result<()>;
}

/// build the storage named in the configuration.
pub fn storage_from_config(config: &StorageConfig) -> Arc<dyn BlobStorage> {
    match config {
        StorageConfig::Local { path } => Arc::new(LocalStorage::new(path)),
    }
}

/// [`BlobStorage`] in a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// storage rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(Error::Storage(format!("invalid blob key {key:?}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStorage for LocalStorage {
    async fn push(&self, key: &str, local: &Path) -> Result<()> {
        let target = self.path_for(key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("{}: {e}", parent.display())))?;
        }
        tokio::fs::copy(local, &target)
            .await
            .map_err(|e| Error::Storage(format!("{}: {e}", local.display())))?;
        Ok(())
    }

    async fn get(&self, key: &str, local: &Path) -> Result<()> {
        let source = self.path_for(key)?;
        tokio::fs::copy(&source, local)
            .await
            .map_err(|e| Error::Storage(format!("{}: {e}", source.display())))?;
        Ok(())
    }
}
