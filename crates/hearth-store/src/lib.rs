// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process collaborators for the Hearth sync engine.
//!
//! [`MemoryStore`] is a realtime row store with a change feed and broadcast
//! channels; [`MemoryUploader`] is an object store for attachments. Both are
//! shared between simulated clients through an `Arc`, which is how the demo
//! binary and the integration tests exercise multi-client convergence.

pub mod adapter;
mod feed;
mod tables;
pub mod uploader;

pub use adapter::MemoryStore;
pub use uploader::MemoryUploader;
