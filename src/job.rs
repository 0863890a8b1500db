//! Job records, the substatus routing table, and the append-only timeline.

use crate::types::{ActorId, JobId, Stage, TimeStamp, WorkflowKind};
use chrono::Utc;
use std::fmt;

/// Job status across the whole onboarding pipeline: the pre-workflow
/// operations phase plus the KYC and BRA substates driven by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum JobStatus {
    #[n(0)]
    OperationsPending,
    #[n(1)]
    OperationsComplete,
    #[n(2)]
    KycPending,
    #[n(3)]
    KycLmroApproved,
    #[n(4)]
    KycDlmroApproved,
    #[n(5)]
    KycComplete,
    #[n(6)]
    KycRejected,
    #[n(7)]
    BraPending,
    #[n(8)]
    BraLmroApproved,
    #[n(9)]
    BraDlmroApproved,
    #[n(10)]
    BraComplete,
    #[n(11)]
    BraRejected,
}

impl JobStatus {
    /// The job status a workflow of `kind` requires before it may start.
    pub fn workflow_predecessor(kind: WorkflowKind) -> JobStatus {
        match kind {
            WorkflowKind::Kyc => JobStatus::OperationsComplete,
            WorkflowKind::Bra => JobStatus::KycComplete,
        }
    }

    /// The substatus a job enters when a workflow of `kind` is initialized.
    pub fn workflow_pending(kind: WorkflowKind) -> JobStatus {
        match kind {
            WorkflowKind::Kyc => JobStatus::KycPending,
            WorkflowKind::Bra => JobStatus::BraPending,
        }
    }

    /// The substatus reached once `stage` has signed off. Approving the final
    /// stage completes the workflow.
    pub fn after_stage(kind: WorkflowKind, stage: Stage) -> JobStatus {
        match (kind, stage) {
            (WorkflowKind::Kyc, Stage::Lmro) => JobStatus::KycLmroApproved,
            (WorkflowKind::Kyc, Stage::Dlmro) => JobStatus::KycDlmroApproved,
            (WorkflowKind::Kyc, Stage::Ceo) => JobStatus::KycComplete,
            (WorkflowKind::Bra, Stage::Lmro) => JobStatus::BraLmroApproved,
            (WorkflowKind::Bra, Stage::Dlmro) => JobStatus::BraDlmroApproved,
            (WorkflowKind::Bra, Stage::Ceo) => JobStatus::BraComplete,
        }
    }

    pub fn workflow_rejected(kind: WorkflowKind) -> JobStatus {
        match kind {
            WorkflowKind::Kyc => JobStatus::KycRejected,
            WorkflowKind::Bra => JobStatus::BraRejected,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::OperationsPending => "operations-pending",
            JobStatus::OperationsComplete => "operations-complete",
            JobStatus::KycPending => "kyc-pending",
            JobStatus::KycLmroApproved => "kyc-lmro-approved",
            JobStatus::KycDlmroApproved => "kyc-dlmro-approved",
            JobStatus::KycComplete => "kyc-complete",
            JobStatus::KycRejected => "kyc-rejected",
            JobStatus::BraPending => "bra-pending",
            JobStatus::BraLmroApproved => "bra-lmro-approved",
            JobStatus::BraDlmroApproved => "bra-dlmro-approved",
            JobStatus::BraComplete => "bra-complete",
            JobStatus::BraRejected => "bra-rejected",
        };
        write!(f, "{name}")
    }
}

/// One entry of the append-only job history.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct TimelineEntry {
    #[n(0)]
    pub status: JobStatus,
    #[n(1)]
    pub description: String,
    #[n(2)]
    pub at: TimeStamp<Utc>,
    #[n(3)]
    pub actor: ActorId,
}

impl TimelineEntry {
    pub fn new(status: JobStatus, description: impl Into<String>, actor: impl Into<ActorId>) -> Self {
        Self {
            status,
            description: description.into(),
            at: TimeStamp::new(),
            actor: actor.into(),
        }
    }
}

impl fmt::Display for TimelineEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.at, self.status, self.description, self.actor
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Job {
    #[n(0)]
    pub id: JobId,
    #[n(1)]
    pub assignee: ActorId,
    #[n(2)]
    pub status: JobStatus,
    #[n(3)]
    pub timeline: Vec<TimelineEntry>,
    #[n(4)]
    pub created_at: TimeStamp<Utc>,
}

impl Job {
    pub fn new(id: impl Into<JobId>, assignee: impl Into<ActorId>) -> Self {
        Self {
            id: id.into(),
            assignee: assignee.into(),
            status: JobStatus::OperationsPending,
            timeline: vec![],
            created_at: TimeStamp::new(),
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    /// Human-readable view of the timeline, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.timeline.iter().map(ToString::to_string).collect()
    }
}
