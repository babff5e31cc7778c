//! Attachment store port for proof-of-delivery files.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use common::{AttachmentId, OrderId};
use domain::{DomainError, ProofKind};
use thiserror::Error;

use crate::error::LifecycleError;

/// A proof-of-delivery file as submitted by the delivery person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofUpload {
    pub order_id: OrderId,
    pub kind: ProofKind,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ProofUpload {
    /// Rejects empty files and file names that are blank or contain a path.
    pub fn validate(&self) -> Result<(), DomainError> {
        let name = self.file_name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation("file name is required".to_string()));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(DomainError::Validation(format!(
                "invalid file name: {name}"
            )));
        }
        if self.bytes.is_empty() {
            return Err(DomainError::Validation("file is empty".to_string()));
        }
        Ok(())
    }

    pub(crate) fn into_attachment(self) -> AttachmentUpload {
        AttachmentUpload {
            order_id: self.order_id,
            file_name: self.file_name.trim().to_string(),
            content_type: self.content_type,
            bytes: self.bytes,
        }
    }
}

/// A file handed to the attachment store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub order_id: OrderId,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Reference to a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    pub id: AttachmentId,
    pub location: String,
    pub size: usize,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct AttachmentError(pub String);

impl From<AttachmentError> for LifecycleError {
    fn from(err: AttachmentError) -> Self {
        LifecycleError::Attachment(err.0)
    }
}

/// Stores uploaded files and returns a reference to them.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn put(&self, upload: AttachmentUpload) -> Result<StoredAttachment, AttachmentError>;
}

/// In-memory attachment store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAttachmentStore {
    files: Arc<Mutex<HashMap<AttachmentId, AttachmentUpload>>>,
}

impl InMemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored upload, if any.
    pub fn get(&self, id: AttachmentId) -> Option<AttachmentUpload> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AttachmentStore for InMemoryAttachmentStore {
    async fn put(&self, upload: AttachmentUpload) -> Result<StoredAttachment, AttachmentError> {
        let id = AttachmentId::new();
        let stored = StoredAttachment {
            id,
            location: format!("memory://orders/{}/{}/{}", upload.order_id, id, upload.file_name),
            size: upload.bytes.len(),
        };
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, upload);
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryAttachmentStore::new();
        let order_id = OrderId::new();
        let stored = store
            .put(AttachmentUpload {
                order_id,
                file_name: "door.jpg".to_string(),
                content_type: Some("image/jpeg".to_string()),
                bytes: vec![1, 2, 3],
            })
            .await
            .unwrap();

        assert_eq!(stored.size, 3);
        assert!(stored.location.ends_with("/door.jpg"));
        assert_eq!(store.get(stored.id).unwrap().order_id, order_id);
        assert_eq!(store.len(), 1);
    }

    fn proof(file_name: &str, bytes: Vec<u8>) -> ProofUpload {
        ProofUpload {
            order_id: OrderId::new(),
            kind: ProofKind::Photo,
            file_name: file_name.to_string(),
            content_type: None,
            bytes,
        }
    }

    #[test]
    fn proof_upload_validation() {
        assert!(proof("door.jpg", vec![1]).validate().is_ok());
        assert!(proof("  ", vec![1]).validate().is_err());
        assert!(proof("../etc/passwd", vec![1]).validate().is_err());
        assert!(proof("door.jpg", Vec::new()).validate().is_err());
    }
}
