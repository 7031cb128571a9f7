// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure and latency injection around [`MemoryStore`].
//!
//! `FlakyStore` forwards every call to the wrapped store unless told to
//! fail. Failed writes never reach the inner store, so no change-feed event
//! is published for them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use hearth_core::{
    AdapterType, BroadcastStream, ChangeKind, ChangeStream, Collaborator, EntityId, Filter,
    HealthStatus, HearthError, Order, RemoteStore, Table,
};
use hearth_store::MemoryStore;

#[derive(Debug, Default)]
struct Faults {
    fail_writes: usize,
    offline: bool,
    fail_reads: bool,
    write_delay: Option<Duration>,
    write_attempts: usize,
}

/// A [`RemoteStore`] that fails or stalls on demand.
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    faults: Mutex<Faults>,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
        }
    }

    /// The wrapped store, for seeding and direct assertions.
    pub fn inner(&self) -> &Arc<MemoryStore> {
        &self.inner
    }

    /// Makes the next `count` writes (insert, update, delete) fail.
    pub async fn fail_next_writes(&self, count: usize) {
        self.faults.lock().await.fail_writes = count;
    }

    /// While offline, every write fails. Reads and subscriptions still work.
    pub async fn set_offline(&self, offline: bool) {
        self.faults.lock().await.offline = offline;
    }

    /// Makes queries fail, e.g. to break feed hydration.
    pub async fn set_fail_reads(&self, fail: bool) {
        self.faults.lock().await.fail_reads = fail;
    }

    /// Delays every write by `delay` before forwarding it.
    pub async fn delay_writes(&self, delay: Option<Duration>) {
        self.faults.lock().await.write_delay = delay;
    }

    /// Number of write calls received, failed or not.
    pub async fn write_attempts(&self) -> usize {
        self.faults.lock().await.write_attempts
    }

    async fn before_write(&self, op: &str, table: Table) -> Result<(), HearthError> {
        let delay = {
            let mut faults = self.faults.lock().await;
            faults.write_attempts += 1;
            if faults.offline {
                debug!(op, %table, "injected offline write failure");
                return Err(HearthError::remote_write(format!("{table}: network unreachable")));
            }
            if faults.fail_writes > 0 {
                faults.fail_writes -= 1;
                debug!(op, %table, "injected write failure");
                return Err(HearthError::remote_write(format!("{table}: injected failure")));
            }
            faults.write_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn before_read(&self, table: Table) -> Result<(), HearthError> {
        if self.faults.lock().await.fail_reads {
            debug!(%table, "injected read failure");
            return Err(HearthError::remote_read(format!("{table}: injected failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl Collaborator for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RemoteStore
    }

    async fn health_check(&self) -> Result<HealthStatus, HearthError> {
        let faults = self.faults.lock().await;
        if faults.offline {
            Ok(HealthStatus::Degraded("offline".into()))
        } else {
            self.inner.health_check().await
        }
    }
}

#[async_trait]
impl RemoteStore for FlakyStore {
    async fn query(
        &self,
        table: Table,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Value>, HearthError> {
        self.before_read(table).await?;
        self.inner.query(table, filter, order).await
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, HearthError> {
        self.before_write("insert", table).await?;
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: Table, id: &EntityId, patch: Value) -> Result<(), HearthError> {
        self.before_write("update", table).await?;
        self.inner.update(table, id, patch).await
    }

    async fn delete(&self, table: Table, id: &EntityId) -> Result<(), HearthError> {
        self.before_write("delete", table).await?;
        self.inner.delete(table, id).await
    }

    async fn subscribe(
        &self,
        table: Table,
        filter: &Filter,
        kinds: &[ChangeKind],
    ) -> Result<ChangeStream, HearthError> {
        self.inner.subscribe(table, filter, kinds).await
    }

    async fn broadcast(
        &self,
        channel: &str,
        event: &str,
        payload: Value,
    ) -> Result<(), HearthError> {
        self.inner.broadcast(channel, event, payload).await
    }

    async fn subscribe_broadcast(
        &self,
        channel: &str,
        event: &str,
    ) -> Result<BroadcastStream, HearthError> {
        self.inner.subscribe_broadcast(channel, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let store = FlakyStore::new(Arc::new(MemoryStore::new()));
        store.fail_next_writes(1).await;

        assert!(store.insert(Table::Messages, json!({})).await.is_err());
        assert!(store.insert(Table::Messages, json!({})).await.is_ok());
        assert_eq!(store.write_attempts().await, 2);
        assert_eq!(store.inner().row_count(Table::Messages).await, 1);
    }

    #[tokio::test]
    async fn offline_blocks_writes_but_not_reads() {
        let store = FlakyStore::new(Arc::new(MemoryStore::new()));
        store.set_offline(true).await;

        let err = store.insert(Table::Chores, json!({})).await.unwrap_err();
        assert!(matches!(err, HearthError::RemoteWrite { .. }));
        assert!(store.query(Table::Chores, &Filter::all(), None).await.is_ok());
        assert_eq!(
            store.health_check().await.unwrap(),
            HealthStatus::Degraded("offline".into())
        );
    }

    #[tokio::test]
    async fn read_failures_are_remote_read_errors() {
        let store = FlakyStore::new(Arc::new(MemoryStore::new()));
        store.set_fail_reads(true).await;
        let err = store
            .query(Table::Profiles, &Filter::all(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HearthError::RemoteRead { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_writes_wait_before_forwarding() {
        let store = FlakyStore::new(Arc::new(MemoryStore::new()));
        store.delay_writes(Some(Duration::from_secs(5))).await;

        let started = tokio::time::Instant::now();
        store.insert(Table::Messages, json!({})).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
