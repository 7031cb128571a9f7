// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Hearth sync engine.

use thiserror::Error;

use crate::types::{EntityId, Table};

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across collaborator traits and engine operations.
///
/// None of these are fatal to a running session: every variant leaves the
/// engine usable, and none are retried automatically.
#[derive(Debug, Error)]
pub enum HearthError {
    /// A mutation precondition failed (empty content, missing association).
    /// Raised before any local state is touched.
    #[error("validation error: {0}")]
    Validation(String),

    /// The remote store rejected an insert, update, or delete.
    #[error("remote write failed: {message}")]
    RemoteWrite {
        message: String,
        source: Option<BoxedSource>,
    },

    /// A remote read failed (initial load or feed hydration).
    #[error("remote read failed: {message}")]
    RemoteRead {
        message: String,
        source: Option<BoxedSource>,
    },

    /// Attachment upload failed; no message is created for it.
    #[error("upload failed: {message}")]
    Upload {
        message: String,
        source: Option<BoxedSource>,
    },

    /// A row did not match the expected wire shape for its table.
    #[error("failed to decode {table} row: {source}")]
    Decode {
        table: Table,
        source: serde_json::Error,
    },

    /// A referenced row does not exist locally or remotely.
    #[error("{table} row not found: {id}")]
    NotFound { table: Table, id: EntityId },

    /// A remote call did not complete in time.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Configuration errors (invalid TOML, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HearthError {
    pub fn remote_write(message: impl Into<String>) -> Self {
        Self::RemoteWrite {
            message: message.into(),
            source: None,
        }
    }

    pub fn remote_read(message: impl Into<String>) -> Self {
        Self::RemoteRead {
            message: message.into(),
            source: None,
        }
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error should be shown to the user, as opposed to only logged.
    ///
    /// Hydration read failures and decode errors happen on the feed path and
    /// never interrupt the user.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::RemoteWrite { .. }
                | Self::Upload { .. }
                | Self::Timeout { .. }
                | Self::NotFound { .. }
        )
    }
}
