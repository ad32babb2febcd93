use std::collections::BTreeMap;

use aws_sdk_s3::Client;

use crate::document::StateDocument;
use crate::error::StorageError;
use crate::objects::{self, WriteCondition};
use crate::record::{ResourceState, StateKey};
use crate::store::{BoxFuture, StateStore};

/// Default object key for the state document.
pub const DEFAULT_STATE_KEY: &str = "_state/canopy.json";

/// How many times a read-modify-write is retried after losing an ETag race.
const MAX_WRITE_ATTEMPTS: usize = 5;

/// Single JSON document in an S3 bucket.
///
/// Writes are guarded by the ETag read in the same cycle, so two processes
/// sharing a bucket never silently overwrite each other.
pub struct S3Store {
    client: Client,
    bucket: String,
    key: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    async fn load(
        &self,
    ) -> Result<(BTreeMap<StateKey, ResourceState>, WriteCondition), StorageError> {
        match objects::get_versioned(&self.client, &self.bucket, &self.key).await? {
            Some(obj) => {
                let entries = StateDocument::from_slice(&obj.body)?;
                tracing::debug!(bucket = %self.bucket, key = %self.key, "state loaded from S3");
                Ok((entries, WriteCondition::IfMatch(obj.etag)))
            }
            None => {
                tracing::debug!(bucket = %self.bucket, key = %self.key, "no state in S3");
                Ok((BTreeMap::new(), WriteCondition::IfAbsent))
            }
        }
    }

    /// Load, apply `mutate`, write back under the loaded ETag. Retries on
    /// a lost race; `mutate` returning `false` skips the write.
    async fn update<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: Fn(&mut BTreeMap<StateKey, ResourceState>) -> bool + Send + Sync,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let (mut entries, condition) = self.load().await?;
            if !mutate(&mut entries) {
                return Ok(());
            }
            let body = StateDocument::to_vec(&entries)?;
            match objects::put_versioned(&self.client, &self.bucket, &self.key, body, &condition)
                .await
            {
                Ok(etag) => {
                    tracing::debug!(bucket = %self.bucket, key = %self.key, %etag, "state flushed to S3");
                    return Ok(());
                }
                Err(StorageError::PreconditionFailed { .. }) => {
                    tracing::warn!(
                        bucket = %self.bucket,
                        key = %self.key,
                        attempt,
                        "state document changed underneath us, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::Conflict {
            key: self.key.clone(),
        })
    }
}

impl StateStore for S3Store {
    fn get<'a>(
        &'a self,
        key: &'a StateKey,
    ) -> BoxFuture<'a, Result<Option<ResourceState>, StorageError>> {
        Box::pin(async move {
            let (mut entries, _) = self.load().await?;
            Ok(entries.remove(key))
        })
    }

    fn put<'a>(
        &'a self,
        key: &'a StateKey,
        state: &'a ResourceState,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.update(|entries| {
                entries.insert(key.clone(), state.clone());
                true
            })
            .await
        })
    }

    fn delete<'a>(&'a self, key: &'a StateKey) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move { self.update(|entries| entries.remove(key).is_some()).await })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<(StateKey, ResourceState)>, StorageError>> {
        Box::pin(async move {
            let (entries, _) = self.load().await?;
            Ok(entries.into_iter().collect())
        })
    }
}
