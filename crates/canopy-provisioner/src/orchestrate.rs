use std::collections::HashSet;

use canopy_core::diff;
use canopy_core::{NaturalKey, ResourceSpec, ValidationError};
use canopy_storage::{ResourceState, StateKey, StateStore, StorageError};
use futures::future::join_all;

use crate::adapter::ResourceAdapter;
use crate::cancel::Cancellation;
use crate::error::{ReconcileError, format_err_chain};
use crate::plan::{Action, Cause, PlanEntry};
use crate::reconciler::{ImportRequest, Reconciler};
use crate::remote::RemoteClient;

/// Binds a [`Reconciler`] to a [`StateStore`]: looks up the record before
/// each call and writes the outcome back after it.
///
/// The store is only touched once the remote call has succeeded, so a
/// failed or interrupted reconcile leaves the previous record in place.
pub struct Provisioner<A, C, S> {
    reconciler: Reconciler<A, C>,
    store: S,
}

impl<A, C, S> Provisioner<A, C, S>
where
    A: ResourceAdapter,
    C: RemoteClient<Request = A::Request, Response = A::Response>,
    S: StateStore,
{
    pub fn new(reconciler: Reconciler<A, C>, store: S) -> Self {
        Self { reconciler, store }
    }

    pub fn reconciler(&self) -> &Reconciler<A, C> {
        &self.reconciler
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn kind(&self) -> &str {
        self.reconciler.kind()
    }

    async fn find(&self, key: &NaturalKey) -> Result<Option<(StateKey, ResourceState)>, ReconcileError> {
        self.store
            .find(self.kind(), key)
            .await
            .map_err(|e| ReconcileError::new(self.kind(), key, e))
    }

    /// Write `state` under its remote-ID key, dropping the record it replaces
    /// if that was keyed differently.
    async fn record(&self, previous: Option<&StateKey>, state: &ResourceState) -> Result<(), ReconcileError> {
        let key = state.key();
        let wrap = |e: StorageError| ReconcileError::new(self.kind(), &state.natural_key, e);
        if let Some(previous) = previous
            && *previous != key
        {
            self.store.delete(previous).await.map_err(wrap)?;
        }
        self.store.put(&key, state).await.map_err(wrap)
    }

    async fn forget(&self, key: &StateKey, natural_key: &NaturalKey) -> Result<(), ReconcileError> {
        self.store
            .delete(key)
            .await
            .map_err(|e| ReconcileError::new(self.kind(), natural_key, e))
    }

    /// Reconcile one declaration and persist the result.
    pub async fn apply(
        &self,
        spec: &ResourceSpec,
        cancel: &Cancellation,
    ) -> Result<ResourceState, ReconcileError> {
        let (_, key) = self.reconciler.prepare(spec)?;
        let found = self.find(&key).await?;
        let state = self
            .reconciler
            .create_or_update(spec, found.as_ref().map(|(_, s)| s), cancel)
            .await?;
        self.record(found.as_ref().map(|(k, _)| k), &state).await?;
        Ok(state)
    }

    /// Apply independent declarations concurrently.
    ///
    /// Declarations sharing a natural key are rejected up front, before any
    /// remote call, since two concurrent upserts of one object would race.
    pub async fn apply_all(
        &self,
        specs: &[ResourceSpec],
        cancel: &Cancellation,
    ) -> Result<Vec<Result<ResourceState, ReconcileError>>, ReconcileError> {
        let mut seen = HashSet::new();
        for spec in specs {
            let (_, key) = self.reconciler.prepare(spec)?;
            if !seen.insert(key.clone()) {
                return Err(ReconcileError::new(
                    self.kind(),
                    &key,
                    ValidationError::single("name", "declared more than once"),
                ));
            }
        }
        let results = join_all(specs.iter().map(|spec| self.apply(spec, cancel))).await;
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            tracing::warn!(error = %format_err_chain(err), "apply failed");
        }
        Ok(results)
    }

    /// Re-read a managed resource. Drops the record if the remote object is
    /// gone and returns `None`.
    pub async fn refresh(
        &self,
        key: &NaturalKey,
        cancel: &Cancellation,
    ) -> Result<Option<ResourceState>, ReconcileError> {
        let Some((store_key, state)) = self.find(key).await? else {
            return Ok(None);
        };
        match self.reconciler.read(&state, cancel).await? {
            Some(fresh) => {
                self.record(Some(&store_key), &fresh).await?;
                Ok(Some(fresh))
            }
            None => {
                self.forget(&store_key, key).await?;
                Ok(None)
            }
        }
    }

    /// Delete a managed resource and its record. Unmanaged keys are a no-op.
    pub async fn destroy(&self, key: &NaturalKey, cancel: &Cancellation) -> Result<(), ReconcileError> {
        let Some((store_key, state)) = self.find(key).await? else {
            tracing::debug!(kind = self.kind(), key = %key, "not managed, nothing to destroy");
            return Ok(());
        };
        self.reconciler.delete(&state, cancel).await?;
        self.forget(&store_key, key).await
    }

    /// Tear down every managed resource of this kind, newest first.
    pub async fn destroy_all(&self, cancel: &Cancellation) -> Result<(), ReconcileError> {
        let mut managed = self.managed().await?;
        managed.sort_by_key(|(_, state)| std::cmp::Reverse(state.observed_at));
        for (store_key, state) in managed {
            self.reconciler.delete(&state, cancel).await?;
            self.forget(&store_key, &state.natural_key).await?;
        }
        Ok(())
    }

    /// Bring an existing remote object under management.
    pub async fn import(
        &self,
        request: &ImportRequest,
        cancel: &Cancellation,
    ) -> Result<ResourceState, ReconcileError> {
        if let Ok(key) = self.reconciler.adapter().parse_remote_id(&request.id)
            && let Some((_, existing)) = self.find(&key).await?
        {
            return Err(ReconcileError::new(
                self.kind(),
                &key,
                ValidationError::single(
                    "id",
                    format!("already managed as {}", existing.remote_id),
                ),
            ));
        }
        let state = self.reconciler.import(request, cancel).await?;
        self.record(None, &state).await?;
        Ok(state)
    }

    async fn managed(&self) -> Result<Vec<(StateKey, ResourceState)>, ReconcileError> {
        let entries = self
            .store
            .list()
            .await
            .map_err(|e| ReconcileError::unkeyed(self.kind(), e))?;
        Ok(entries
            .into_iter()
            .filter(|(key, _)| key.kind == self.kind())
            .collect())
    }

    /// Read every declared resource and diff it against its declaration.
    ///
    /// Produces one entry per declaration, in order, plus a `Delete` entry for
    /// every record no longer declared. Nothing is written anywhere.
    pub async fn plan(
        &self,
        specs: &[ResourceSpec],
        cancel: &Cancellation,
    ) -> Result<Vec<PlanEntry>, ReconcileError> {
        let schema = self.reconciler.adapter().schema();
        let mut entries = Vec::with_capacity(specs.len());
        let mut declared = HashSet::new();

        // 1. Declarations, in order
        for spec in specs {
            let (desired, key) = self.reconciler.prepare(spec)?;
            declared.insert(key.clone());

            let recorded = self.find(&key).await?.map(|(_, state)| state);
            let entry = match recorded {
                None => PlanEntry {
                    kind: self.kind().to_string(),
                    natural_key: key,
                    action: Action::Create,
                    cause: Cause::FirstProvision,
                    changes: vec![],
                    desired: Some(desired),
                    state: None,
                },
                Some(recorded) => match self.reconciler.read(&recorded, cancel).await? {
                    // Vanished remotely → recreate
                    None => PlanEntry {
                        kind: self.kind().to_string(),
                        natural_key: key,
                        action: Action::Create,
                        cause: Cause::Drift,
                        changes: vec![],
                        desired: Some(desired),
                        state: None,
                    },
                    Some(fresh) => {
                        let changes = diff::diff(schema, &desired, &fresh.observed);
                        let (action, cause) = if changes.is_empty() {
                            (Action::Ok, Cause::InSync)
                        } else {
                            let action = if diff::requires_replacement(&changes) {
                                Action::Replace
                            } else {
                                Action::Update
                            };
                            // Remote unchanged since the last apply means the
                            // declaration moved, not the object.
                            let drifted = !diff::diff(schema, &recorded.observed, &fresh.observed)
                                .is_empty();
                            (action, if drifted { Cause::Drift } else { Cause::ConfigChanged })
                        };
                        PlanEntry {
                            kind: self.kind().to_string(),
                            natural_key: key,
                            action,
                            cause,
                            changes,
                            desired: Some(desired),
                            state: Some(fresh),
                        }
                    }
                },
            };
            entries.push(entry);
        }

        // 2. Orphans: recorded but no longer declared
        for (_, state) in self.managed().await? {
            if !declared.contains(&state.natural_key) {
                entries.push(PlanEntry {
                    kind: self.kind().to_string(),
                    natural_key: state.natural_key.clone(),
                    action: Action::Delete,
                    cause: Cause::Orphaned,
                    changes: vec![],
                    desired: None,
                    state: Some(state),
                });
            }
        }

        Ok(entries)
    }

    /// Execute all actionable entries of a plan.
    ///
    /// Creates, replaces and updates run in declaration order; deletes run
    /// last, in reverse order. The store is updated after every action.
    pub async fn execute(&self, entries: &[PlanEntry], cancel: &Cancellation) -> Result<(), ReconcileError> {
        for entry in entries {
            let Some(desired) = &entry.desired else {
                continue;
            };
            match entry.action {
                Action::Create | Action::Update => {
                    tracing::info!(kind = %entry.kind, key = %entry.natural_key, action = %entry.action, "executing");
                    let previous = self.find(&entry.natural_key).await?;
                    let state = self
                        .reconciler
                        .create_or_update(desired, entry.state.as_ref(), cancel)
                        .await?;
                    self.record(previous.as_ref().map(|(k, _)| k), &state).await?;
                }
                Action::Replace => {
                    let Some(old) = &entry.state else {
                        continue;
                    };
                    tracing::info!(kind = %entry.kind, key = %entry.natural_key, "replacing");
                    self.reconciler.delete(old, cancel).await?;
                    if let Some((store_key, _)) = self.find(&entry.natural_key).await? {
                        self.forget(&store_key, &entry.natural_key).await?;
                    }
                    let state = self.reconciler.create_or_update(desired, None, cancel).await?;
                    self.record(None, &state).await?;
                }
                Action::Delete | Action::Ok => {}
            }
        }

        for entry in entries.iter().filter(|e| e.action == Action::Delete).rev() {
            let Some(state) = &entry.state else {
                continue;
            };
            tracing::info!(kind = %entry.kind, key = %entry.natural_key, "destroying orphan");
            self.reconciler.delete(state, cancel).await?;
            if let Some((store_key, _)) = self.find(&entry.natural_key).await? {
                self.forget(&store_key, &entry.natural_key).await?;
            }
        }

        Ok(())
    }
}
