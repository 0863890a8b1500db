//! Blob store contract for stage documents, plus an in-memory implementation.
//!
//! The engine only ever holds references (`object id`, `url`); the bytes live
//! behind this trait. Uploads must succeed before any approval state is
//! persisted; deletes are best-effort and never fail the workflow.

use crate::types::ObjectId;
use crate::utils;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Stage/job-scoped folder, e.g. `kyc/job_…/LMRO`.
    pub folder: String,
    pub file_name: String,
    pub mime_type: String,
}

/// Where an accepted upload ended up.
#[derive(Debug, Clone)]
pub struct BlobHandle {
    pub url: String,
    pub object_id: ObjectId,
}

#[derive(thiserror::Error, Debug)]
pub enum BlobError {
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
    #[error("blob store refused the upload: {0}")]
    Rejected(String),
    #[error("no blob stored under object id {0}")]
    Missing(ObjectId),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, bytes: &[u8], opts: &UploadOptions) -> Result<BlobHandle, BlobError>;
    async fn delete(&self, object_id: &str) -> Result<(), BlobError>;
}

/// In-process blob store backed by a map. Serves tests and local runs; a real
/// deployment plugs an object-storage client into [`BlobStore`] instead.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<ObjectId, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, object_id: &str) -> bool {
        self.blobs
            .lock()
            .expect("blob store lock poisoned")
            .contains_key(object_id)
    }

    pub fn bytes_of(&self, object_id: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .expect("blob store lock poisoned")
            .get(object_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().expect("blob store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, bytes: &[u8], opts: &UploadOptions) -> Result<BlobHandle, BlobError> {
        let object_id =
            utils::new_object_id().map_err(|err| BlobError::Unavailable(err.to_string()))?;
        let url = format!("memory://{}/{}", opts.folder, object_id);

        self.blobs
            .lock()
            .expect("blob store lock poisoned")
            .insert(object_id.clone(), bytes.to_vec());

        Ok(BlobHandle { url, object_id })
    }

    async fn delete(&self, object_id: &str) -> Result<(), BlobError> {
        self.blobs
            .lock()
            .expect("blob store lock poisoned")
            .remove(object_id)
            .map(|_| ())
            .ok_or_else(|| BlobError::Missing(object_id.to_string()))
    }
}
