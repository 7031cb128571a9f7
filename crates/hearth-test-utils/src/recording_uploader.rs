// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment uploader that records uploads and fails on demand.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use hearth_core::{AdapterType, AttachmentUploader, Collaborator, HealthStatus, HearthError};
use hearth_store::MemoryUploader;

/// One upload seen by a [`RecordingUploader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub path: String,
    pub content_type: String,
    pub size: usize,
    pub succeeded: bool,
}

/// Records every upload attempt before handing it to a [`MemoryUploader`].
pub struct RecordingUploader {
    inner: Arc<MemoryUploader>,
    uploads: Mutex<Vec<RecordedUpload>>,
    fail_next: Mutex<usize>,
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryUploader::new()),
            uploads: Mutex::new(Vec::new()),
            fail_next: Mutex::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<MemoryUploader> {
        &self.inner
    }

    /// Makes the next `count` uploads fail.
    pub async fn fail_next(&self, count: usize) {
        *self.fail_next.lock().await = count;
    }

    pub async fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().await.clone()
    }
}

impl Default for RecordingUploader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collaborator for RecordingUploader {
    fn name(&self) -> &str {
        "recording-uploader"
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
impl AttachmentUploader for RecordingUploader {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, HearthError> {
        let size = bytes.len();
        let injected = {
            let mut fail_next = self.fail_next.lock().await;
            let fail = *fail_next > 0;
            *fail_next = fail_next.saturating_sub(1);
            fail
        };

        let result = if injected {
            Err(HearthError::upload(format!("{path}: injected failure")))
        } else {
            self.inner.upload(path, bytes, content_type).await
        };

        self.uploads.lock().await.push(RecordedUpload {
            path: path.to_string(),
            content_type: content_type.to_string(),
            size,
            succeeded: result.is_ok(),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_successes_and_failures() {
        let uploader = RecordingUploader::new();
        uploader.fail_next(1).await;

        assert!(uploader.upload("h/a.png", vec![1], "image/png").await.is_err());
        assert!(uploader.upload("h/b.png", vec![1, 2], "image/png").await.is_ok());

        let uploads = uploader.uploads().await;
        assert_eq!(uploads.len(), 2);
        assert!(!uploads[0].succeeded);
        assert!(uploads[1].succeeded);
        assert_eq!(uploads[1].size, 2);
        assert!(uploader.inner().get("h/b.png").await.is_some());
    }
}
