// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process attachment object store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use hearth_core::{AdapterType, AttachmentUploader, Collaborator, HealthStatus, HearthError};

/// Public URL prefix of objects held by [`MemoryUploader`].
pub const PUBLIC_URL_PREFIX: &str = "memory://attachments/";

/// A stored attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Keeps uploaded objects in memory, keyed by path.
#[derive(Default)]
pub struct MemoryUploader {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait]
impl Collaborator for MemoryUploader {
    fn name(&self) -> &str {
        "memory-uploader"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::AttachmentUploader
    }

    async fn health_check(&self) -> Result<HealthStatus, HearthError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl AttachmentUploader for MemoryUploader {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, HearthError> {
        if bytes.is_empty() {
            return Err(HearthError::upload(format!("{path}: empty object")));
        }
        if path.is_empty() || path.starts_with('/') {
            return Err(HearthError::upload(format!("invalid object path `{path}`")));
        }

        let size = bytes.len();
        self.objects.lock().await.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        debug!(path, size, content_type, "attachment stored");
        Ok(format!("{PUBLIC_URL_PREFIX}{path}"))
    }
}
