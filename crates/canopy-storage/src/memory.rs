use std::collections::BTreeMap;

use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::record::{ResourceState, StateKey};
use crate::store::{BoxFuture, StateStore};

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<StateKey, ResourceState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn get<'a>(
        &'a self,
        key: &'a StateKey,
    ) -> BoxFuture<'a, Result<Option<ResourceState>, StorageError>> {
        Box::pin(async move { Ok(self.entries.lock().await.get(key).cloned()) })
    }

    fn put<'a>(
        &'a self,
        key: &'a StateKey,
        state: &'a ResourceState,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.entries.lock().await.insert(key.clone(), state.clone());
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a StateKey) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.entries.lock().await.remove(key);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<(StateKey, ResourceState)>, StorageError>> {
        Box::pin(async move {
            Ok(self
                .entries
                .lock()
                .await
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        })
    }
}
