//! Caller-facing workflow error taxonomy.
//!
//! Every variant is a recoverable, typed outcome: the different humans acting
//! on a case (LMRO, DLMRO, CEO) must be able to self-diagnose why their
//! submission was refused, so validation failures always surface the specific
//! reason rather than a generic failure.

use crate::actor::Capability;
use crate::job::JobStatus;
use crate::store::StoreError;
use crate::types::{ApprovalStage, ApprovalStatus, Stage};

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("job must be in status {required} to start this workflow, found {actual}")]
    InvalidJobState {
        required: JobStatus,
        actual: JobStatus,
    },
    #[error("workflow already initialized, currently at stage {stage}")]
    AlreadyInitialized { stage: ApprovalStage },
    #[error("workflow was rejected and cannot be restarted")]
    AlreadyRejected,
    #[error("approval is at stage {current}, submission named {submitted}")]
    StageMismatch {
        current: ApprovalStage,
        submitted: Stage,
    },
    #[error("actor lacks the {required} capability")]
    Unauthorized { required: Capability },
    #[error("a supporting document is required at every stage")]
    DocumentRequired,
    #[error("supporting document rejected: {0}")]
    DocumentInvalid(String),
    #[error("rejection requires a non-empty reason")]
    ReasonRequired,
    #[error("stage {0} has not been approved yet")]
    PredecessorNotApproved(Stage),
    #[error("approval is already finalized as {0}")]
    AlreadyFinalized(ApprovalStatus),
    #[error("document storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("approval changed underneath this submission, reload and retry")]
    StaleWriteConflict,
    #[error("{0} not found")]
    NotFound(String),
    #[error("case store failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StaleWrite => WorkflowError::StaleWriteConflict,
            other => WorkflowError::Store(other),
        }
    }
}
