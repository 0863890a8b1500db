//! Stage documents: stored artifact metadata and the upload draft builder.

use crate::config::DocumentPolicy;
use crate::error::WorkflowError;
use crate::types::{ActorId, ObjectId, TimeStamp};
use chrono::Utc;

/// Metadata of a document held by exactly one stage record. The blob store
/// owns the bytes; this record holds the reference.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Document {
    #[n(0)]
    pub url: String,
    #[n(1)]
    pub file_name: String,
    #[n(2)]
    pub mime_type: String,
    #[n(3)]
    pub storage_id: ObjectId,
    #[n(4)]
    pub checksum: String,
    #[n(5)]
    pub uploaded_at: TimeStamp<Utc>,
    #[n(6)]
    pub uploaded_by: ActorId,
}

/// Draft of a document submission. Built field by field, then checked against
/// the stage policy before anything touches the blob store.
#[derive(Debug, Default, Clone)]
pub struct DocumentUpload {
    file_name: Option<String>,
    mime_type: Option<String>,
    bytes: Option<Vec<u8>>,
}

/// A validated upload, ready for the blob store.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub checksum: String,
}

impl DocumentUpload {
    /// Construct a new draft object.
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
    pub fn set_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
    pub fn set_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.bytes = Some(bytes);
        self
    }

    /// Checks fields against the stage policy. Returns the prepared upload
    /// with its sha256 checksum.
    pub fn validate_and_finalise(
        self,
        policy: &DocumentPolicy,
    ) -> Result<PreparedDocument, WorkflowError> {
        let (Some(file_name), Some(mime_type), Some(bytes)) =
            (self.file_name, self.mime_type, self.bytes)
        else {
            return Err(WorkflowError::DocumentRequired);
        };
        if bytes.is_empty() {
            return Err(WorkflowError::DocumentRequired);
        }
        if !policy.allows_mime(&mime_type) {
            return Err(WorkflowError::DocumentInvalid(format!(
                "mime type {mime_type} is not accepted at this stage"
            )));
        }
        if bytes.len() as u64 > policy.max_bytes {
            return Err(WorkflowError::DocumentInvalid(format!(
                "file is {} bytes, stage limit is {}",
                bytes.len(),
                policy.max_bytes
            )));
        }

        let checksum = sha256::digest(&bytes);

        Ok(PreparedDocument {
            file_name,
            mime_type,
            bytes,
            checksum,
        })
    }
}
