// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait that all external collaborators implement.

use async_trait::async_trait;

use crate::error::HearthError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for external collaborators (remote store, uploader).
///
/// Provides identity and health check capabilities so a session can report
/// which backends it is wired to.
#[async_trait]
pub trait Collaborator: Send + Sync + 'static {
    /// Returns the human-readable name of this collaborator instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this collaborator.
    fn version(&self) -> semver::Version;

    /// Returns the kind of collaborator.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the collaborator's current status.
    async fn health_check(&self) -> Result<HealthStatus, HearthError>;
}
