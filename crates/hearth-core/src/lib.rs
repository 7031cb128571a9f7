// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Hearth household sync engine.
//!
//! This crate provides the domain types, the row codec that sits at the
//! data-access boundary, the error taxonomy, and the traits for the external
//! collaborators (remote store, attachment uploader) the engine talks to.

pub mod domain;
pub mod error;
pub mod record;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use domain::{
    Chore, ChoreStatus, ChoreTemplate, DEFAULT_REACTION, Message, Profile, Reaction,
    RecurrenceRule,
};
pub use error::HearthError;
pub use record::{Joined, Record};
pub use types::{
    AdapterType, ChangeEvent, ChangeKind, EntityId, Filter, HealthStatus, Order, Table,
};

pub use traits::{AttachmentUploader, BroadcastStream, ChangeStream, Collaborator, RemoteStore};
