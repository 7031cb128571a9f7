// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Hearth integration tests.
//!
//! Provides failure-injecting collaborators and a multi-client harness for
//! fast, deterministic tests without a real backend.
//!
//! # Components
//!
//! - [`FlakyStore`] - wraps a `MemoryStore` and injects write/read failures and latency
//! - [`RecordingUploader`] - attachment uploader that records uploads and can fail on demand
//! - [`TestHousehold`] - shared store plus any number of client sessions

pub mod flaky_store;
pub mod harness;
pub mod recording_uploader;

pub use flaky_store::FlakyStore;
pub use harness::{TestHousehold, TestHouseholdBuilder};
pub use recording_uploader::{RecordedUpload, RecordingUploader};
