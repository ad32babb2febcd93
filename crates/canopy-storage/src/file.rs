use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio::sync::Mutex;

use crate::document::StateDocument;
use crate::error::StorageError;
use crate::record::{ResourceState, StateKey};
use crate::store::{BoxFuture, StateStore};

/// Single JSON document on local disk.
///
/// Every mutation rewrites the whole document atomically (tmp + rename), so
/// a crash mid-write leaves the previous version intact.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<StateKey, ResourceState>, StorageError> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no state file, starting fresh");
            return Ok(BTreeMap::new());
        }
        let bytes = std::fs::read(&self.path)?;
        let entries = StateDocument::from_slice(&bytes)?;
        tracing::debug!(
            path = %self.path.display(),
            resources = entries.len(),
            "state loaded from local disk"
        );
        Ok(entries)
    }

    fn flush(&self, entries: &BTreeMap<StateKey, ResourceState>) -> Result<(), StorageError> {
        let json = StateDocument::to_vec(entries)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), "state flushed to local disk");
        Ok(())
    }
}

impl StateStore for FileStore {
    fn get<'a>(
        &'a self,
        key: &'a StateKey,
    ) -> BoxFuture<'a, Result<Option<ResourceState>, StorageError>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            Ok(self.load()?.remove(key))
        })
    }

    fn put<'a>(
        &'a self,
        key: &'a StateKey,
        state: &'a ResourceState,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut entries = self.load()?;
            entries.insert(key.clone(), state.clone());
            self.flush(&entries)
        })
    }

    fn delete<'a>(&'a self, key: &'a StateKey) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut entries = self.load()?;
            if entries.remove(key).is_some() {
                self.flush(&entries)?;
            }
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<(StateKey, ResourceState)>, StorageError>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            Ok(self.load()?.into_iter().collect())
        })
    }
}
