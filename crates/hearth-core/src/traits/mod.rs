// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the external collaborators of the sync engine.
//!
//! All collaborators extend the [`Collaborator`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod store;
pub mod upload;

pub use adapter::Collaborator;
pub use store::{BroadcastStream, ChangeStream, RemoteStore};
pub use upload::AttachmentUploader;
