//! Case store contract and the sled-backed implementation.
//!
//! Approvals are written with a compare-and-swap keyed on the stage the
//! writer believes is current, so two racing submissions cannot both advance
//! the pipeline; the loser observes [`StoreError::StaleWrite`]. Job updates
//! go through a read-modify-CAS loop that only touches status and timeline,
//! never overwriting fields other subsystems own.

use crate::approval::Approval;
use crate::job::{Job, JobStatus, TimelineEntry};
use crate::types::{Stage, WorkflowKind};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("case store backend failure: {0}")]
    Backend(#[from] sled::Error),
    #[error("record encoding failure: {0}")]
    Codec(String),
    #[error("record already exists")]
    AlreadyExists,
    #[error("stored stage no longer matches the expected stage")]
    StaleWrite,
    #[error("record not found")]
    Missing,
}

#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError>;
    async fn put_job(&self, job: &Job) -> Result<(), StoreError>;
    /// Atomically set the job status and append the timeline entry.
    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        entry: TimelineEntry,
    ) -> Result<(), StoreError>;
    async fn get_approval(
        &self,
        job_id: &str,
        kind: WorkflowKind,
    ) -> Result<Option<Approval>, StoreError>;
    /// Insert-if-absent; at most one approval may exist per `(job, kind)`.
    async fn create_approval(&self, approval: &Approval) -> Result<(), StoreError>;
    /// Conditional write: commits only if the stored record is still at
    /// `expected_stage`.
    async fn save_approval(
        &self,
        approval: &Approval,
        expected_stage: Stage,
    ) -> Result<(), StoreError>;
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, StoreError> {
    minicbor::to_vec(value).map_err(|err| StoreError::Codec(err.to_string()))
}

fn decode<T: for<'b> minicbor::Decode<'b, ()>>(bytes: &[u8]) -> Result<T, StoreError> {
    minicbor::decode(bytes).map_err(|err| StoreError::Codec(err.to_string()))
}

/// Case store on an embedded sled database. Calls are cheap enough to run
/// inline on the async executor.
pub struct SledCaseStore {
    db: Arc<sled::Db>,
}

impl SledCaseStore {
    pub fn new(db: Arc<sled::Db>) -> Self {
        Self { db }
    }

    fn job_key(job_id: &str) -> Vec<u8> {
        format!("job/{job_id}").into_bytes()
    }

    fn approval_key(job_id: &str, kind: WorkflowKind) -> Vec<u8> {
        format!("approval/{kind}/{job_id}").into_bytes()
    }
}

#[async_trait]
impl CaseStore for SledCaseStore {
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        match self.db.get(Self::job_key(job_id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_job(&self, job: &Job) -> Result<(), StoreError> {
        self.db.insert(Self::job_key(&job.id), encode(job)?)?;
        Ok(())
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        entry: TimelineEntry,
    ) -> Result<(), StoreError> {
        let key = Self::job_key(job_id);
        loop {
            let current = self.db.get(&key)?.ok_or(StoreError::Missing)?;
            let mut job: Job = decode(&current)?;
            job.status = status;
            job.timeline.push(entry.clone());

            let next = encode(&job)?;
            match self
                .db
                .compare_and_swap(&key, Some(current.as_ref()), Some(next))?
            {
                Ok(()) => return Ok(()),
                // another writer touched the job; re-read and reapply
                Err(_) => continue,
            }
        }
    }

    async fn get_approval(
        &self,
        job_id: &str,
        kind: WorkflowKind,
    ) -> Result<Option<Approval>, StoreError> {
        match self.db.get(Self::approval_key(job_id, kind))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn create_approval(&self, approval: &Approval) -> Result<(), StoreError> {
        let key = Self::approval_key(&approval.job_id, approval.kind);
        match self
            .db
            .compare_and_swap(key, None::<&[u8]>, Some(encode(approval)?))?
        {
            Ok(()) => Ok(()),
            Err(_) => Err(StoreError::AlreadyExists),
        }
    }

    async fn save_approval(
        &self,
        approval: &Approval,
        expected_stage: Stage,
    ) -> Result<(), StoreError> {
        let key = Self::approval_key(&approval.job_id, approval.kind);
        let current = self.db.get(&key)?.ok_or(StoreError::Missing)?;

        let stored: Approval = decode(&current)?;
        if stored.current_stage != expected_stage.marker() {
            return Err(StoreError::StaleWrite);
        }

        let next = encode(approval)?;
        match self
            .db
            .compare_and_swap(&key, Some(current.as_ref()), Some(next))?
        {
            Ok(()) => Ok(()),
            Err(_) => Err(StoreError::StaleWrite),
        }
    }
}
