use std::fmt;
use std::time::Duration;

use canopy_core::diff::{self, requires_replacement};
use canopy_core::{NaturalKey, ResourceSpec, ValidationError};
use canopy_storage::ResourceState;
use tokio::time::Instant;

use crate::adapter::ResourceAdapter;
use crate::cancel::Cancellation;
use crate::config::ReconcilerConfig;
use crate::error::{ErrorKind, Operation, ReconcileError};
use crate::poller::{OperationPoller, PollError};
use crate::remote::{RemoteClient, RemoteError, Submission};

/// External identity supplied by an operator to adopt an existing object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub kind: String,
    pub id: String,
}

impl ImportRequest {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Lifecycle of one managed instance. Only `Absent` and `Present` are ever
/// persisted; the rest exist for the duration of a blocking call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Phase::Absent => "absent",
            Phase::Creating => "creating",
            Phase::Present => "present",
            Phase::Updating => "updating",
            Phase::Deleting => "deleting",
        })
    }
}

/// Drives create/read/update/delete for one resource kind.
///
/// Holds no per-instance state and takes no locks: the caller serializes
/// calls for a given identity, distinct identities may run in parallel.
pub struct Reconciler<A, C> {
    adapter: A,
    client: C,
    config: ReconcilerConfig,
    poller: OperationPoller,
}

impl<A, C> Reconciler<A, C>
where
    A: ResourceAdapter,
    C: RemoteClient<Request = A::Request, Response = A::Response>,
{
    pub fn new(adapter: A, client: C, config: ReconcilerConfig) -> Self {
        let poller = OperationPoller::new(config.poll);
        Self {
            adapter,
            client,
            config,
            poller,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn kind(&self) -> &str {
        self.adapter.kind()
    }

    /// Defaults, canonical ordering, the constraint table, then the natural key.
    pub fn prepare(&self, spec: &ResourceSpec) -> Result<(ResourceSpec, NaturalKey), ReconcileError> {
        let kind = self.adapter.kind();
        let schema = self.adapter.schema();
        let desired = schema.normalize(spec);
        let key = self
            .adapter
            .natural_key(&desired)
            .map_err(|e| ReconcileError::unkeyed(kind, e))?;
        schema
            .validate(&desired)
            .map_err(|e| ReconcileError::new(kind, &key, e))?;
        Ok((desired, key))
    }

    /// Upsert the remote object so it matches `spec`.
    ///
    /// The live object is read first and diffed against the declaration.
    /// With `existing = None` a hit either fails with `AlreadyExists` (when
    /// imports are required) or is adopted. Safe to repeat after a lost
    /// response.
    pub async fn create_or_update(
        &self,
        spec: &ResourceSpec,
        existing: Option<&ResourceState>,
        cancel: &Cancellation,
    ) -> Result<ResourceState, ReconcileError> {
        let kind = self.adapter.kind();
        let schema = self.adapter.schema();
        let (desired, key) = self.prepare(spec)?;
        let err = |k: ErrorKind| ReconcileError::new(kind, &key, k);

        // Validation errors never reach the remote.
        let request = self.adapter.expand(&desired).map_err(|e| err(e.into()))?;
        let remote_id = match existing {
            Some(state) => state.remote_id.clone(),
            None => self.adapter.remote_id(&key),
        };

        // Diff against the live object, never the recorded one.
        let operation = match self.fetch(&remote_id, &key, Operation::Read, cancel).await? {
            None => Operation::Create,
            Some(found) => {
                let found_id = self
                    .adapter
                    .response_id(&found)
                    .unwrap_or_else(|| remote_id.clone());
                if existing.is_none() && self.config.require_import {
                    return Err(err(ErrorKind::AlreadyExists {
                        remote_id: found_id,
                    }));
                }

                let observed = self.adapter.flatten(&found);
                let changes = diff::diff(schema, &desired, &observed);
                if changes.is_empty() {
                    tracing::info!(
                        kind,
                        key = %key,
                        remote_id = %found_id,
                        adopted = existing.is_none(),
                        "remote object already matches declaration"
                    );
                    return Ok(self.observed_state(&key, found_id, observed));
                }
                if requires_replacement(&changes) {
                    return Err(err(replacement_error(&changes).into()));
                }
                tracing::debug!(kind, key = %key, changes = changes.len(), "remote differs from declaration");
                Operation::Update
            }
        };

        let (from, during) = match operation {
            Operation::Create => (Phase::Absent, Phase::Creating),
            _ => (Phase::Present, Phase::Updating),
        };
        tracing::info!(
            kind,
            key = %key,
            remote_id = %remote_id,
            from = %from,
            to = %during,
            spec = ?schema.redact(&desired),
            "submitting {operation}"
        );

        let submission = self
            .client
            .create(&remote_id, &request)
            .await
            .map_err(|e| err(ErrorKind::from_remote(operation, e)))?;

        if let Submission::Pending(handle) = submission {
            let timeout = match operation {
                Operation::Create => self.config.timeouts.create,
                _ => self.config.timeouts.update,
            };
            self.poller
                .await_completion(&self.client, handle, Instant::now() + timeout, cancel)
                .await
                .map_err(|e| err(poll_error(operation, timeout, e)))?;
        }

        // Read back to pick up computed fields.
        let Some(read) = self.fetch(&remote_id, &key, operation, cancel).await? else {
            return Err(err(ErrorKind::RemoteOperationFailed {
                operation,
                payload: serde_json::json!({
                    "message": "remote object not found after a successful submission",
                }),
            }));
        };
        let Some(id) = self.adapter.response_id(&read) else {
            return Err(err(ErrorKind::RemoteOperationFailed {
                operation,
                payload: serde_json::json!({ "message": "remote object has no ID" }),
            }));
        };

        let state = self.observed_state(&key, id, self.adapter.flatten(&read));
        tracing::info!(
            kind,
            key = %key,
            remote_id = %state.remote_id,
            from = %during,
            to = %Phase::Present,
            "{operation} complete"
        );
        Ok(state)
    }

    /// Refresh observed state. `Ok(None)` means the remote object is gone and
    /// the record should be dropped.
    pub async fn read(
        &self,
        state: &ResourceState,
        cancel: &Cancellation,
    ) -> Result<Option<ResourceState>, ReconcileError> {
        let key = &state.natural_key;
        match self.fetch(&state.remote_id, key, Operation::Read, cancel).await? {
            Some(response) => {
                let id = self
                    .adapter
                    .response_id(&response)
                    .unwrap_or_else(|| state.remote_id.clone());
                Ok(Some(self.observed_state(key, id, self.adapter.flatten(&response))))
            }
            None => {
                tracing::info!(
                    kind = self.adapter.kind(),
                    key = %key,
                    remote_id = %state.remote_id,
                    from = %Phase::Present,
                    to = %Phase::Absent,
                    "remote object was not found, removing from state"
                );
                Ok(None)
            }
        }
    }

    /// Delete the remote object. Already-gone counts as success.
    pub async fn delete(
        &self,
        state: &ResourceState,
        cancel: &Cancellation,
    ) -> Result<(), ReconcileError> {
        let kind = self.adapter.kind();
        let key = &state.natural_key;
        let err = |k: ErrorKind| ReconcileError::new(kind, key, k);

        tracing::info!(
            kind,
            key = %key,
            remote_id = %state.remote_id,
            from = %Phase::Present,
            to = %Phase::Deleting,
            "submitting delete"
        );

        let submission = match self.client.delete(&state.remote_id).await {
            Ok(submission) => submission,
            Err(RemoteError::NotFound) => {
                tracing::info!(kind, key = %key, "remote object already gone");
                return Ok(());
            }
            Err(e) => return Err(err(ErrorKind::from_remote(Operation::Delete, e))),
        };

        if let Submission::Pending(handle) = submission {
            let timeout = self.config.timeouts.delete;
            match self
                .poller
                .await_completion(&self.client, handle, Instant::now() + timeout, cancel)
                .await
            {
                Ok(_) | Err(PollError::NotFound) => {}
                Err(e) => return Err(err(poll_error(Operation::Delete, timeout, e))),
            }
        }

        tracing::info!(
            kind,
            key = %key,
            remote_id = %state.remote_id,
            from = %Phase::Deleting,
            to = %Phase::Absent,
            "delete complete"
        );
        Ok(())
    }

    /// Adopt an existing remote object by its external identity.
    /// Never mutates the remote.
    pub async fn import(
        &self,
        request: &ImportRequest,
        cancel: &Cancellation,
    ) -> Result<ResourceState, ReconcileError> {
        let kind = self.adapter.kind();
        if request.kind != kind {
            return Err(ReconcileError::unkeyed(
                kind,
                ValidationError::single(
                    "kind",
                    format!("import of {:?} routed to the {kind} handler", request.kind),
                ),
            ));
        }
        let key = self
            .adapter
            .parse_remote_id(&request.id)
            .map_err(|e| ReconcileError::unkeyed(kind, e))?;
        let remote_id = self.adapter.remote_id(&key);

        let Some(response) = self.fetch(&remote_id, &key, Operation::Import, cancel).await? else {
            return Err(ReconcileError::new(kind, &key, ErrorKind::NotFound));
        };
        let id = self.adapter.response_id(&response).unwrap_or(remote_id);
        let state = self.observed_state(&key, id, self.adapter.flatten(&response));
        tracing::info!(kind, key = %key, remote_id = %state.remote_id, "imported");
        Ok(state)
    }

    /// GET bounded by the read timeout and the cancellation signal.
    /// Not-found is `Ok(None)`.
    async fn fetch(
        &self,
        remote_id: &str,
        key: &NaturalKey,
        operation: Operation,
        cancel: &Cancellation,
    ) -> Result<Option<A::Response>, ReconcileError> {
        let kind = self.adapter.kind();
        let timeout = self.config.timeouts.read;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ReconcileError::new(kind, key, ErrorKind::Canceled { operation }));
            }
            res = tokio::time::timeout(timeout, self.client.get(remote_id)) => res,
        };
        match result {
            Err(_elapsed) => Err(ReconcileError::new(
                kind,
                key,
                ErrorKind::Timeout { operation, timeout },
            )),
            Ok(Ok(response)) => Ok(Some(response)),
            Ok(Err(RemoteError::NotFound)) => Ok(None),
            Ok(Err(e)) => Err(ReconcileError::new(
                kind,
                key,
                ErrorKind::from_remote(operation, e),
            )),
        }
    }

    fn observed_state(&self, key: &NaturalKey, remote_id: String, observed: ResourceSpec) -> ResourceState {
        ResourceState {
            kind: self.adapter.kind().to_string(),
            natural_key: key.clone(),
            remote_id,
            tags: self.adapter.tags(&observed),
            observed,
            observed_at: jiff::Timestamp::now(),
        }
    }
}

fn replacement_error(changes: &[diff::FieldChange]) -> ValidationError {
    let errors = changes
        .iter()
        .filter(|c| c.force_new)
        .map(|c| {
            canopy_core::FieldError::new(
                &c.path,
                format!("cannot change from {} to {} in place; the resource must be replaced", c.old, c.new),
            )
        })
        .collect::<Vec<_>>();
    ValidationError::from(errors)
}

fn poll_error(operation: Operation, timeout: Duration, err: PollError) -> ErrorKind {
    match err {
        PollError::Timeout => ErrorKind::Timeout { operation, timeout },
        PollError::Interrupted => ErrorKind::Canceled { operation },
        PollError::Failed(payload) => ErrorKind::RemoteOperationFailed { operation, payload },
        PollError::RemoteCanceled => ErrorKind::RemoteOperationFailed {
            operation,
            payload: serde_json::json!({ "status": "Canceled" }),
        },
        PollError::NotFound => ErrorKind::NotFound,
        PollError::Remote(e) => ErrorKind::from_remote(operation, e),
    }
}
