// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote row store with a realtime change feed and broadcast channels.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde_json::Value;

use crate::error::HearthError;
use crate::traits::adapter::Collaborator;
use crate::types::{ChangeEvent, ChangeKind, EntityId, Filter, Order, Table};

/// Push stream of row-level change events for one subscription.
pub type ChangeStream = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

/// Push stream of broadcast payloads for one channel/event pair.
pub type BroadcastStream = Pin<Box<dyn Stream<Item = Value> + Send>>;

/// A generic realtime-capable relational row store.
///
/// Rows cross this boundary as raw JSON; decoding into domain types happens
/// once, in [`crate::Record::decode`].
#[async_trait]
pub trait RemoteStore: Collaborator {
    /// Returns all rows of `table` matching `filter`, optionally ordered.
    async fn query(
        &self,
        table: Table,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Value>, HearthError>;

    /// Inserts a row and returns the row as stored (with server-assigned columns).
    async fn insert(&self, table: Table, row: Value) -> Result<Value, HearthError>;

    /// Applies a partial update to the row with `id`.
    async fn update(&self, table: Table, id: &EntityId, patch: Value) -> Result<(), HearthError>;

    /// Deletes the row with `id`.
    async fn delete(&self, table: Table, id: &EntityId) -> Result<(), HearthError>;

    /// Subscribes to changes of `kinds` on rows of `table` matching `filter`.
    ///
    /// The stream ends when the store shuts down; dropping it unsubscribes.
    async fn subscribe(
        &self,
        table: Table,
        filter: &Filter,
        kinds: &[ChangeKind],
    ) -> Result<ChangeStream, HearthError>;

    /// Sends an ephemeral payload to every subscriber of `channel`/`event`.
    async fn broadcast(&self, channel: &str, event: &str, payload: Value)
    -> Result<(), HearthError>;

    /// Subscribes to ephemeral payloads on `channel`/`event`.
    async fn subscribe_broadcast(
        &self,
        channel: &str,
        event: &str,
    ) -> Result<BroadcastStream, HearthError>;
}
