// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process implementation of the [`RemoteStore`] trait.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use hearth_core::{
    AdapterType, BroadcastStream, ChangeEvent, ChangeKind, ChangeStream, Collaborator, EntityId,
    Filter, HealthStatus, HearthError, Order, RemoteStore, Table,
};

use crate::feed::{BroadcastSubscribers, FeedSubscribers};
use crate::tables::TableRows;

/// A realtime row store held entirely in memory.
///
/// Every committed write is published to matching change-feed subscribers
/// while the store lock is held, so subscribers observe changes in commit
/// order. Several sessions (simulated clients) can share one store through
/// an `Arc`.
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    tables: HashMap<Table, TableRows>,
    feeds: FeedSubscribers,
    broadcasts: BroadcastSubscribers,
    closed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Number of rows currently stored in `table`.
    pub async fn row_count(&self, table: Table) -> usize {
        let state = self.state.lock().await;
        state.tables.get(&table).map_or(0, TableRows::len)
    }

    /// Number of live change-feed subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        self.state.lock().await.feeds.len()
    }

    /// Ends every subscription stream and rejects further calls.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.feeds.clear();
        state.broadcasts.clear();
        debug!("memory store closed");
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn ensure_open(&self) -> Result<(), HearthError> {
        if self.closed {
            Err(HearthError::remote_write("store is closed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Collaborator for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RemoteStore
    }

    async fn health_check(&self) -> Result<HealthStatus, HearthError> {
        let state = self.state.lock().await;
        if state.closed {
            Ok(HealthStatus::Unhealthy("closed".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn query(
        &self,
        table: Table,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Value>, HearthError> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(HearthError::remote_read("store is closed"));
        }
        Ok(state
            .tables
            .get(&table)
            .map(|rows| rows.query(filter, order))
            .unwrap_or_default())
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, HearthError> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let stored = state.tables.entry(table).or_default().insert(table, row)?;
        debug!(%table, id = ?stored.get("id"), "row inserted");
        state.feeds.publish(&ChangeEvent {
            table,
            kind: ChangeKind::Insert,
            row: stored.clone(),
        });
        Ok(stored)
    }

    async fn update(&self, table: Table, id: &EntityId, patch: Value) -> Result<(), HearthError> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let updated = state
            .tables
            .entry(table)
            .or_default()
            .update(table, id, patch)?;
        debug!(%table, %id, "row updated");
        state.feeds.publish(&ChangeEvent {
            table,
            kind: ChangeKind::Update,
            row: updated,
        });
        Ok(())
    }

    async fn delete(&self, table: Table, id: &EntityId) -> Result<(), HearthError> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        // Deleting a missing row is not an error, matching SQL semantics.
        if let Some(old) = state.tables.entry(table).or_default().delete(id) {
            debug!(%table, %id, "row deleted");
            state.feeds.publish(&ChangeEvent {
                table,
                kind: ChangeKind::Delete,
                row: old,
            });
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        table: Table,
        filter: &Filter,
        kinds: &[ChangeKind],
    ) -> Result<ChangeStream, HearthError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(HearthError::remote_read("store is closed"));
        }
        Ok(state.feeds.register(table, filter.clone(), kinds.to_vec()))
    }

    async fn broadcast(
        &self,
        channel: &str,
        event: &str,
        payload: Value,
    ) -> Result<(), HearthError> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        state.broadcasts.publish(channel, event, &payload);
        Ok(())
    }

    async fn subscribe_broadcast(
        &self,
        channel: &str,
        event: &str,
    ) -> Result<BroadcastStream, HearthError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(HearthError::remote_read("store is closed"));
        }
        Ok(state.broadcasts.register(channel, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_implements_collaborator() {
        let store = MemoryStore::new();
        assert_eq!(store.name(), "memory");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.adapter_type(), AdapterType::RemoteStore);
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn writes_are_published_to_matching_subscribers() {
        let store = MemoryStore::new();
        let mut h1 = store
            .subscribe(Table::Chores, &Filter::eq("household_id", "h1"), &ChangeKind::ALL)
            .await
            .unwrap();

        let row = store
            .insert(Table::Chores, json!({ "household_id": "h2", "title": "other" }))
            .await
            .unwrap();
        assert!(row["id"].is_string());
        let row = store
            .insert(Table::Chores, json!({ "household_id": "h1", "title": "bins" }))
            .await
            .unwrap();
        let id = EntityId::from(row["id"].as_str().unwrap());
        store
            .update(Table::Chores, &id, json!({ "title": "recycling" }))
            .await
            .unwrap();
        store.delete(Table::Chores, &id).await.unwrap();

        let insert = h1.next().await.unwrap();
        assert_eq!(insert.kind, ChangeKind::Insert);
        assert_eq!(insert.row["title"], "bins");
        let update = h1.next().await.unwrap();
        assert_eq!(update.kind, ChangeKind::Update);
        assert_eq!(update.row["title"], "recycling");
        let delete = h1.next().await.unwrap();
        assert_eq!(delete.kind, ChangeKind::Delete);
        assert_eq!(delete.row_id(), Some(id));
    }

    #[tokio::test]
    async fn rejected_duplicate_reaction_publishes_nothing() {
        let store = MemoryStore::new();
        let mut feed = store
            .subscribe(Table::MessageReactions, &Filter::all(), &ChangeKind::ALL)
            .await
            .unwrap();

        let heart = json!({ "message_id": "m-1", "user_id": "u-1", "emoji": "❤️" });
        store
            .insert(Table::MessageReactions, heart.clone())
            .await
            .unwrap();
        let err = store
            .insert(Table::MessageReactions, heart)
            .await
            .unwrap_err();
        assert!(matches!(err, HearthError::RemoteWrite { .. }));
        store
            .insert(
                Table::MessageReactions,
                json!({ "message_id": "m-1", "user_id": "u-2", "emoji": "❤️" }),
            )
            .await
            .unwrap();

        assert_eq!(feed.next().await.unwrap().row["user_id"], "u-1");
        assert_eq!(feed.next().await.unwrap().row["user_id"], "u-2");
        assert_eq!(store.row_count(Table::MessageReactions).await, 2);
    }

    #[tokio::test]
    async fn subscription_respects_event_kinds() {
        let store = MemoryStore::new();
        let mut deletes = store
            .subscribe(Table::Messages, &Filter::all(), &[ChangeKind::Delete])
            .await
            .unwrap();
        let row = store
            .insert(Table::Messages, json!({ "content": "hi" }))
            .await
            .unwrap();
        let id = EntityId::from(row["id"].as_str().unwrap());
        store.delete(Table::Messages, &id).await.unwrap();

        assert_eq!(deletes.next().await.unwrap().kind, ChangeKind::Delete);
    }

    #[tokio::test]
    async fn dropped_streams_are_pruned() {
        let store = MemoryStore::new();
        let stream = store
            .subscribe(Table::Messages, &Filter::all(), &ChangeKind::ALL)
            .await
            .unwrap();
        assert_eq!(store.subscriber_count().await, 1);
        drop(stream);
        store
            .insert(Table::Messages, json!({ "content": "hi" }))
            .await
            .unwrap();
        assert_eq!(store.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_channel_subscribers_only() {
        let store = MemoryStore::new();
        let mut typing = store.subscribe_broadcast("typing:h1", "typing").await.unwrap();
        let mut other = store.subscribe_broadcast("typing:h2", "typing").await.unwrap();

        store
            .broadcast("typing:h1", "typing", json!({ "user_id": "u1" }))
            .await
            .unwrap();
        store.close().await;

        assert_eq!(typing.next().await.unwrap()["user_id"], "u1");
        assert!(typing.next().await.is_none());
        assert!(other.next().await.is_none());
    }

    #[tokio::test]
    async fn closed_store_rejects_writes() {
        let store = MemoryStore::new();
        store.close().await;
        assert!(store.insert(Table::Messages, json!({})).await.is_err());
        assert!(matches!(
            store.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }
}
