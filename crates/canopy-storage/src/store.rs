use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use canopy_core::NaturalKey;

use crate::error::StorageError;
use crate::record::{KeyId, ResourceState, StateKey};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence for [`ResourceState`] records.
///
/// Callers serialize mutations per identity; implementations only need to
/// keep their own data structures consistent. Methods return boxed futures
/// for dyn compatibility.
pub trait StateStore: Send + Sync {
    fn get<'a>(
        &'a self,
        key: &'a StateKey,
    ) -> BoxFuture<'a, Result<Option<ResourceState>, StorageError>>;

    fn put<'a>(
        &'a self,
        key: &'a StateKey,
        state: &'a ResourceState,
    ) -> BoxFuture<'a, Result<(), StorageError>>;

    /// Remove a record. Removing a missing key is not an error.
    fn delete<'a>(&'a self, key: &'a StateKey) -> BoxFuture<'a, Result<(), StorageError>>;

    fn list(&self) -> BoxFuture<'_, Result<Vec<(StateKey, ResourceState)>, StorageError>>;

    /// Locate the record for a natural key, whichever way it is keyed.
    fn find<'a>(
        &'a self,
        kind: &'a str,
        natural_key: &'a NaturalKey,
    ) -> BoxFuture<'a, Result<Option<(StateKey, ResourceState)>, StorageError>> {
        Box::pin(async move {
            let entries = self.list().await?;
            Ok(entries.into_iter().find(|(key, state)| {
                key.kind == kind
                    && match &key.id {
                        KeyId::Natural(k) => k == natural_key,
                        KeyId::Remote(_) => &state.natural_key == natural_key,
                    }
            }))
        })
    }
}

macro_rules! forward_state_store {
    ($ptr:ident) => {
        impl<T: StateStore + ?Sized> StateStore for $ptr<T> {
            fn get<'a>(
                &'a self,
                key: &'a StateKey,
            ) -> BoxFuture<'a, Result<Option<ResourceState>, StorageError>> {
                (**self).get(key)
            }

            fn put<'a>(
                &'a self,
                key: &'a StateKey,
                state: &'a ResourceState,
            ) -> BoxFuture<'a, Result<(), StorageError>> {
                (**self).put(key, state)
            }

            fn delete<'a>(
                &'a self,
                key: &'a StateKey,
            ) -> BoxFuture<'a, Result<(), StorageError>> {
                (**self).delete(key)
            }

            fn list(
                &self,
            ) -> BoxFuture<'_, Result<Vec<(StateKey, ResourceState)>, StorageError>> {
                (**self).list()
            }
        }
    };
}

forward_state_store!(Box);
forward_state_store!(Arc);
