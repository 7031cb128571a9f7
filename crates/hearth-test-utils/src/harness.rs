// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-client test harness.
//!
//! `TestHousehold` seeds an in-process store with member profiles and opens
//! one [`HouseholdSession`] per simulated device. All clients share the same
//! [`FlakyStore`] and [`RecordingUploader`], so a write from one client shows
//! up on the change feeds of every other.

use std::sync::Arc;

use hearth_config::HearthConfig;
use hearth_core::{EntityId, HearthError, RemoteStore, Table};
use hearth_store::MemoryStore;
use hearth_sync::{HouseholdSession, Identity};
use serde_json::json;

use crate::flaky_store::FlakyStore;
use crate::recording_uploader::RecordingUploader;

/// Household used when the builder is not given one.
pub const DEFAULT_HOUSEHOLD: &str = "household-1";

/// Builder for [`TestHousehold`].
pub struct TestHouseholdBuilder {
    household_id: EntityId,
    members: Vec<Identity>,
    config: HearthConfig,
}

impl TestHouseholdBuilder {
    fn new() -> Self {
        Self {
            household_id: DEFAULT_HOUSEHOLD.into(),
            members: Vec::new(),
            config: HearthConfig::default(),
        }
    }

    pub fn with_household(mut self, household_id: impl Into<EntityId>) -> Self {
        self.household_id = household_id.into();
        self
    }

    /// Adds a member with a seeded profile row.
    pub fn with_member(mut self, id: &str, display_name: &str) -> Self {
        self.members.push(Identity {
            id: id.into(),
            display_name: display_name.into(),
        });
        self
    }

    pub fn with_config(mut self, config: HearthConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn build(self) -> Result<TestHousehold, HearthError> {
        let memory = Arc::new(MemoryStore::new());
        for member in &self.members {
            memory
                .insert(
                    Table::Profiles,
                    json!({ "id": member.id, "full_name": member.display_name }),
                )
                .await?;
        }

        Ok(TestHousehold {
            household_id: self.household_id,
            members: self.members,
            config: self.config,
            store: Arc::new(FlakyStore::new(memory)),
            uploader: Arc::new(RecordingUploader::new()),
        })
    }
}

/// A seeded household shared by any number of simulated clients.
pub struct TestHousehold {
    household_id: EntityId,
    members: Vec<Identity>,
    config: HearthConfig,
    store: Arc<FlakyStore>,
    uploader: Arc<RecordingUploader>,
}

impl TestHousehold {
    pub fn builder() -> TestHouseholdBuilder {
        TestHouseholdBuilder::new()
    }

    pub fn household_id(&self) -> &EntityId {
        &self.household_id
    }

    /// The shared store, for injecting faults and asserting on rows.
    pub fn store(&self) -> &Arc<FlakyStore> {
        &self.store
    }

    pub fn uploader(&self) -> &Arc<RecordingUploader> {
        &self.uploader
    }

    /// Opens a session signed in as `member_id`.
    pub async fn client(&self, member_id: &str) -> Result<HouseholdSession, HearthError> {
        let identity = self
            .members
            .iter()
            .find(|member| member.id.as_str() == member_id)
            .cloned()
            .ok_or_else(|| HearthError::NotFound {
                table: Table::Profiles,
                id: member_id.into(),
            })?;

        HouseholdSession::open(
            self.household_id.clone(),
            identity,
            self.store.clone(),
            self.uploader.clone(),
            self.config.clone(),
        )
        .await
    }
}
