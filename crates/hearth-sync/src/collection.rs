// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered, id-keyed in-memory collections of domain records.
//!
//! An [`EntityCollection`] is the single owner of one list shown to the user
//! (messages, chores, or templates). Optimistic inserts, reconciliation with
//! the server row, reverts, and change-feed merges all go through its methods,
//! which keep three properties after every call:
//!
//! - at most one entry per id,
//! - entries sorted by the configured order (stable for equal keys),
//! - observers are notified only when the visible contents changed.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use hearth_core::{EntityId, Record};
use tokio::sync::{Mutex, watch};
use tracing::debug;

/// A collection shared between the mutation coordinator and feed mergers.
pub type SharedCollection<T> = Arc<Mutex<EntityCollection<T>>>;

/// A remote change already decoded into a domain record.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange<T> {
    Insert(T),
    Update(T),
    Delete(EntityId),
}

/// Returned by [`EntityCollection::insert_optimistic`]; names the temporary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct OptimisticHandle {
    temporary_id: EntityId,
}

impl OptimisticHandle {
    pub fn temporary_id(&self) -> &EntityId {
        &self.temporary_id
    }
}

pub struct EntityCollection<T: Record> {
    entries: Vec<T>,
    pending: HashSet<EntityId>,
    order: fn(&T, &T) -> Ordering,
    revision: watch::Sender<u64>,
}

impl<T: Record> EntityCollection<T> {
    /// An empty collection ordered by [`Record::sort_cmp`].
    pub fn new() -> Self {
        Self::with_order(T::sort_cmp)
    }

    /// An empty collection with a custom ordering.
    pub fn with_order(order: fn(&T, &T) -> Ordering) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            entries: Vec::new(),
            pending: HashSet::new(),
            order,
            revision,
        }
    }

    /// Wraps a new collection for sharing.
    pub fn shared() -> SharedCollection<T> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Replaces the contents with an initial load. Later rows win on id clashes.
    pub fn load(&mut self, rows: impl IntoIterator<Item = T>) {
        self.entries.clear();
        self.pending.clear();
        for row in rows {
            self.place(row);
        }
        self.resort();
        self.notify();
    }

    /// Inserts a locally created entity ahead of server confirmation.
    pub fn insert_optimistic(&mut self, entity: T) -> OptimisticHandle {
        let temporary_id = entity.id().clone();
        self.pending.insert(temporary_id.clone());
        if self.place(entity) {
            self.resort();
            self.notify();
        }
        debug!(table = %T::TABLE, temp_id = %temporary_id, "optimistic entry inserted");
        OptimisticHandle { temporary_id }
    }

    /// Replaces the temporary entry with the server-confirmed row.
    ///
    /// Derived state of the temporary entry is merged into the server row by
    /// the owning id. If the change feed already delivered the server row,
    /// the temporary entry is dropped and the existing row updated in place.
    /// If the temporary entry is gone, the server row is still inserted.
    pub fn reconcile(&mut self, temporary_id: &EntityId, mut server: T) {
        self.pending.remove(temporary_id);

        let temporary = if server.id() != temporary_id {
            self.take(temporary_id)
        } else {
            None
        };
        if let Some(temporary) = &temporary {
            server.carry_derived(temporary);
        }

        let server_id = server.id().clone();
        let placed = self.place(server);
        if placed || temporary.is_some() {
            self.resort();
            self.notify();
        }
        debug!(
            table = %T::TABLE,
            temp_id = %temporary_id,
            id = %server_id,
            "optimistic entry reconciled"
        );
    }

    /// Removes the temporary entry entirely, returning it.
    pub fn revert(&mut self, temporary_id: &EntityId) -> Option<T> {
        self.pending.remove(temporary_id);
        let removed = self.take(temporary_id);
        if removed.is_some() {
            self.notify();
            debug!(table = %T::TABLE, temp_id = %temporary_id, "optimistic entry reverted");
        }
        removed
    }

    /// Folds a remote change into the collection.
    ///
    /// Inserts and updates are upserts keyed by id: an insert for an id that
    /// is already present updates it in place, and an update for an absent id
    /// inserts it. Returns `false` (and notifies nobody) when nothing changed.
    pub fn apply_remote(&mut self, change: RemoteChange<T>) -> bool {
        let changed = match change {
            RemoteChange::Insert(entity) | RemoteChange::Update(entity) => self.place(entity),
            RemoteChange::Delete(id) => {
                self.pending.remove(&id);
                self.take(&id).is_some()
            }
        };
        if changed {
            self.resort();
            self.notify();
        }
        changed
    }

    /// Applies `mutate` to the entry with `id`. Returns whether it changed.
    pub fn modify(&mut self, id: &EntityId, mutate: impl FnOnce(&mut T)) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        let mut updated = self.entries[pos].clone();
        mutate(&mut updated);
        if updated == self.entries[pos] {
            return false;
        }
        self.entries[pos] = updated;
        self.resort();
        self.notify();
        true
    }

    /// Removes the entry with `id` (a local delete), returning it.
    pub fn remove(&mut self, id: &EntityId) -> Option<T> {
        self.pending.remove(id);
        let removed = self.take(id);
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Puts back a snapshot taken before a failed local mutation.
    pub fn restore(&mut self, snapshot: T) {
        let id = snapshot.id().clone();
        if let Some(pos) = self.position(&id) {
            if self.entries[pos] == snapshot {
                return;
            }
            self.entries[pos] = snapshot;
        } else {
            self.entries.push(snapshot);
        }
        self.resort();
        self.notify();
    }

    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.position(id).map(|pos| &self.entries[pos])
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.position(id).is_some()
    }

    /// First entry matching `predicate`, in collection order.
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<&T> {
        self.entries.iter().find(|entry| predicate(entry))
    }

    /// Whether the entry with `id` is still awaiting server confirmation.
    pub fn is_pending(&self, id: &EntityId) -> bool {
        self.pending.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// A copy of the current contents in display order.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Observes the change counter; it increments once per visible change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Inserts or updates `entity` by id without sorting. Returns whether
    /// anything changed.
    fn place(&mut self, mut entity: T) -> bool {
        match self.position(entity.id()) {
            Some(pos) => {
                entity.carry_derived(&self.entries[pos]);
                if entity == self.entries[pos] {
                    return false;
                }
                self.entries[pos] = entity;
                true
            }
            None => {
                self.entries.push(entity);
                true
            }
        }
    }

    fn take(&mut self, id: &EntityId) -> Option<T> {
        let pos = self.position(id)?;
        Some(self.entries.remove(pos))
    }

    fn position(&self, id: &EntityId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id() == id)
    }

    fn resort(&mut self) {
        // `sort_by` is stable, so equal keys keep their relative order.
        self.entries.sort_by(self.order);
    }

    fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

impl<T: Record> Default for EntityCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> std::fmt::Debug for EntityCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCollection")
            .field("table", &T::TABLE)
            .field("len", &self.entries.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
