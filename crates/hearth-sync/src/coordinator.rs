// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end orchestration of one optimistic mutation.
//!
//! Every mutation walks `INIT -> OPTIMISTIC_APPLIED -> CONFIRMED | REVERTED`:
//!
//! - **INIT** validates preconditions; a failure returns
//!   [`HearthError::Validation`] and touches nothing.
//! - **OPTIMISTIC_APPLIED** changes the local collection right away and
//!   records a [`PendingMutation`].
//! - **CONFIRMED** reconciles with the server row once the write succeeds.
//! - **REVERTED** undoes the local change when the write fails or exceeds the
//!   configured write timeout. The error is returned to the caller.
//!
//! Nothing is retried; a retry is a new user action.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hearth_config::model::SyncConfig;
use hearth_core::{EntityId, HearthError, Record, RemoteStore, Table};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::collection::SharedCollection;

/// Lifecycle states of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Init,
    OptimisticApplied,
    Confirmed,
    Reverted,
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationState::Init => write!(f, "init"),
            MutationState::OptimisticApplied => write!(f, "optimistic_applied"),
            MutationState::Confirmed => write!(f, "confirmed"),
            MutationState::Reverted => write!(f, "reverted"),
        }
    }
}

/// Remote outcome of a tracked mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Remove,
}

/// An in-flight mutation. Dropped as soon as it is confirmed or failed.
#[derive(Debug, Clone)]
pub struct PendingMutation<T> {
    pub temporary_id: EntityId,
    pub submitted_at: DateTime<Utc>,
    /// The entity as it was optimistically applied (or, for a remove, as it
    /// was before removal).
    pub entity_snapshot: T,
    pub status: PendingStatus,
    pub kind: MutationKind,
}

impl<T> PendingMutation<T> {
    fn new(id: &EntityId, entity_snapshot: T, kind: MutationKind) -> Self {
        Self {
            temporary_id: id.clone(),
            submitted_at: Utc::now(),
            entity_snapshot,
            status: PendingStatus::Pending,
            kind,
        }
    }

    pub fn state(&self) -> MutationState {
        match self.status {
            PendingStatus::Pending => MutationState::OptimisticApplied,
            PendingStatus::Confirmed => MutationState::Confirmed,
            PendingStatus::Failed => MutationState::Reverted,
        }
    }
}

/// Applies mutations of one record type to its collection and the remote store.
pub struct MutationCoordinator<T: Record> {
    collection: SharedCollection<T>,
    store: Arc<dyn RemoteStore>,
    write_timeout: Duration,
    client_assigned_ids: bool,
    pending: Mutex<HashMap<EntityId, PendingMutation<T>>>,
}

impl<T: Record> MutationCoordinator<T> {
    pub fn new(
        collection: SharedCollection<T>,
        store: Arc<dyn RemoteStore>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            collection,
            store,
            write_timeout: config.write_timeout(),
            client_assigned_ids: config.client_assigned_ids,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn collection(&self) -> &SharedCollection<T> {
        &self.collection
    }

    /// Number of mutations awaiting a remote outcome.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn pending(&self, id: &EntityId) -> Option<PendingMutation<T>> {
        self.pending.lock().await.get(id).cloned()
    }

    /// Creates `entity` optimistically and inserts it remotely.
    ///
    /// Returns the reconciled entity on success.
    pub async fn create(&self, entity: T) -> Result<T, HearthError> {
        let temporary_id = entity.id().clone();
        if let Err(e) = entity.validate() {
            debug!(table = %T::TABLE, state = %MutationState::Init, error = %e, "mutation rejected");
            return Err(e);
        }
        let row = self.outbound_row(&entity)?;

        let _ = self
            .collection
            .lock()
            .await
            .insert_optimistic(entity.clone());
        self.track(&temporary_id, entity, MutationKind::Create).await;

        let result = bounded(self.write_timeout, self.store.insert(T::TABLE, row))
            .await
            .and_then(T::decode);

        match result {
            Ok(server) => {
                let server_id = server.id().clone();
                let mut collection = self.collection.lock().await;
                collection.reconcile(&temporary_id, server.clone());
                let confirmed = collection.get(&server_id).cloned().unwrap_or(server);
                drop(collection);
                self.settle(&temporary_id, PendingStatus::Confirmed).await;
                Ok(confirmed)
            }
            Err(e) => {
                self.collection.lock().await.revert(&temporary_id);
                self.settle(&temporary_id, PendingStatus::Failed).await;
                warn!(table = %T::TABLE, temp_id = %temporary_id, error = %e, "create reverted");
                Err(e)
            }
        }
    }

    /// Applies `mutate` to the entry with `id` locally, then patches it remotely.
    ///
    /// On failure the pre-mutation snapshot is restored. Returns the value the
    /// store confirmed. Only one update or remove per id may be in flight.
    pub async fn update(
        &self,
        id: &EntityId,
        mutate: impl FnOnce(&mut T),
    ) -> Result<T, HearthError> {
        let snapshot = self.claim(id, MutationKind::Update).await?;
        let mut updated = snapshot.clone();
        mutate(&mut updated);
        if let Err(e) = updated.validate() {
            self.release(id).await;
            debug!(table = %T::TABLE, %id, state = %MutationState::Init, error = %e, "mutation rejected");
            return Err(e);
        }
        if updated.id() != id {
            self.release(id).await;
            return Err(HearthError::Internal(format!(
                "update of {id} attempted to change its id"
            )));
        }
        let patch = match self.patch_row(&updated) {
            Ok(patch) => patch,
            Err(e) => {
                self.release(id).await;
                return Err(e);
            }
        };

        let replacement = updated.clone();
        self.collection.lock().await.modify(id, move |entry| {
            *entry = replacement;
        });
        self.applied(id, MutationKind::Update);

        match bounded(self.write_timeout, self.store.update(T::TABLE, id, patch)).await {
            Ok(()) => {
                self.settle(id, PendingStatus::Confirmed).await;
                Ok(updated)
            }
            Err(e) => {
                self.collection.lock().await.restore(snapshot);
                self.settle(id, PendingStatus::Failed).await;
                warn!(table = %T::TABLE, %id, error = %e, "update reverted");
                Err(e)
            }
        }
    }

    /// Removes the entry with `id` locally, then deletes it remotely.
    ///
    /// On failure the removed entry is put back.
    pub async fn remove(&self, id: &EntityId) -> Result<T, HearthError> {
        self.claim(id, MutationKind::Remove).await?;
        let Some(snapshot) = self.collection.lock().await.remove(id) else {
            self.release(id).await;
            return Err(self.not_found(id));
        };
        self.applied(id, MutationKind::Remove);

        match bounded(self.write_timeout, self.store.delete(T::TABLE, id)).await {
            Ok(()) => {
                self.settle(id, PendingStatus::Confirmed).await;
                Ok(snapshot)
            }
            Err(e) => {
                self.collection.lock().await.restore(snapshot);
                self.settle(id, PendingStatus::Failed).await;
                warn!(table = %T::TABLE, %id, error = %e, "remove reverted");
                Err(e)
            }
        }
    }

    /// Registers a pending mutation of `id` and returns its current entry.
    ///
    /// Refuses ids that are missing, still optimistic, or already carrying a
    /// mutation in flight. Check and registration happen under one lock.
    async fn claim(&self, id: &EntityId, kind: MutationKind) -> Result<T, HearthError> {
        let mut pending = self.pending.lock().await;
        let noun = table_noun(T::TABLE);
        if pending.contains_key(id) {
            return Err(HearthError::Validation(format!(
                "{noun} {id} already has a change in flight"
            )));
        }
        let snapshot = {
            let collection = self.collection.lock().await;
            if collection.is_pending(id) {
                return Err(HearthError::Validation(format!(
                    "{noun} {id} is still being saved"
                )));
            }
            collection.get(id).cloned().ok_or_else(|| self.not_found(id))?
        };
        pending.insert(id.clone(), PendingMutation::new(id, snapshot.clone(), kind));
        Ok(snapshot)
    }

    /// Drops a claim whose mutation never reached the collection.
    async fn release(&self, id: &EntityId) {
        self.pending.lock().await.remove(id);
    }

    fn not_found(&self, id: &EntityId) -> HearthError {
        HearthError::NotFound {
            table: T::TABLE,
            id: id.clone(),
        }
    }

    /// The insert row. Unless ids are client-assigned, the store picks `id`
    /// and `created_at`.
    fn outbound_row(&self, entity: &T) -> Result<Value, HearthError> {
        let mut row = entity.encode()?;
        if !self.client_assigned_ids
            && let Value::Object(columns) = &mut row
        {
            columns.remove("id");
            columns.remove("created_at");
        }
        Ok(row)
    }

    fn patch_row(&self, entity: &T) -> Result<Value, HearthError> {
        let mut row = entity.encode()?;
        if let Value::Object(columns) = &mut row {
            columns.remove("id");
            columns.remove("created_at");
        }
        Ok(row)
    }

    async fn track(&self, id: &EntityId, snapshot: T, kind: MutationKind) {
        self.pending
            .lock()
            .await
            .insert(id.clone(), PendingMutation::new(id, snapshot, kind));
        self.applied(id, kind);
    }

    fn applied(&self, id: &EntityId, kind: MutationKind) {
        debug!(
            table = %T::TABLE,
            temp_id = %id,
            ?kind,
            state = %MutationState::OptimisticApplied,
            "mutation applied locally"
        );
    }

    async fn settle(&self, id: &EntityId, status: PendingStatus) {
        if let Some(mut mutation) = self.pending.lock().await.remove(id) {
            mutation.status = status;
            let elapsed = Utc::now() - mutation.submitted_at;
            debug!(
                table = %T::TABLE,
                temp_id = %id,
                kind = ?mutation.kind,
                state = %mutation.state(),
                elapsed_ms = elapsed.num_milliseconds(),
                "mutation settled"
            );
        }
    }
}

/// Runs a remote write, mapping expiry of `timeout` to [`HearthError::Timeout`].
pub(crate) async fn bounded<R>(
    timeout: Duration,
    call: impl Future<Output = Result<R, HearthError>>,
) -> Result<R, HearthError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(HearthError::Timeout { duration: timeout }),
    }
}

fn table_noun(table: Table) -> &'static str {
    match table {
        Table::Messages => "message",
        Table::MessageReactions => "reaction",
        Table::Chores => "chore",
        Table::ChoreTemplates => "template",
        Table::Profiles => "profile",
    }
}
