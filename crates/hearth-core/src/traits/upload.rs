// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment upload to object storage.

use async_trait::async_trait;

use crate::error::HearthError;
use crate::traits::adapter::Collaborator;

/// Uploads binary attachments and returns a public URL for them.
#[async_trait]
pub trait AttachmentUploader: Collaborator {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, HearthError>;
}
