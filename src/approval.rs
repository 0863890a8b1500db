//! The approval state machine.
//!
//! One `Approval` exists per `(job, workflow kind)` pair and walks the fixed
//! sequence LMRO -> DLMRO -> CEO -> Completed, with Rejected reachable from
//! any review stage. All transition rules live here, free of I/O; the service
//! layer supplies authorization, document storage, and persistence around it.

use crate::document::Document;
use crate::error::WorkflowError;
use crate::types::{ActorId, ApprovalStage, ApprovalStatus, JobId, Stage, TimeStamp, WorkflowKind};
use chrono::Utc;

/// The approval/document/notes bundle for one review stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct StageRecord {
    #[n(0)]
    pub approved: bool,
    #[n(1)]
    pub approved_by: Option<ActorId>,
    #[n(2)]
    pub approved_at: Option<TimeStamp<Utc>>,
    #[n(3)]
    pub notes: Option<String>,
    #[n(4)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Rejection {
    #[n(0)]
    pub reason: String,
    #[n(1)]
    pub rejected_by: ActorId,
    #[n(2)]
    pub rejected_at: TimeStamp<Utc>,
}

/// What a successful stage approval did, for the orchestrator to act on.
#[derive(Debug)]
pub struct AdvanceOutcome {
    /// Stage the approval now sits at.
    pub next: ApprovalStage,
    /// Document displaced from the predecessor stage, to be purged from the
    /// blob store best-effort.
    pub superseded: Option<Document>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Approval {
    #[n(0)]
    pub job_id: JobId,
    #[n(1)]
    pub kind: WorkflowKind,
    #[n(2)]
    pub status: ApprovalStatus,
    #[n(3)]
    pub current_stage: ApprovalStage,
    #[n(4)]
    pub lmro: StageRecord,
    #[n(5)]
    pub dlmro: StageRecord,
    #[n(6)]
    pub ceo: StageRecord,
    #[n(7)]
    pub rejection: Option<Rejection>,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
    #[n(9)]
    pub completed_at: Option<TimeStamp<Utc>>,
}

impl Approval {
    pub fn new(job_id: impl Into<JobId>, kind: WorkflowKind, created_at: TimeStamp<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
            status: ApprovalStatus::InProgress,
            current_stage: ApprovalStage::Lmro,
            lmro: StageRecord::default(),
            dlmro: StageRecord::default(),
            ceo: StageRecord::default(),
            rejection: None,
            created_at,
            completed_at: None,
        }
    }

    pub fn stage_record(&self, stage: Stage) -> &StageRecord {
        match stage {
            Stage::Lmro => &self.lmro,
            Stage::Dlmro => &self.dlmro,
            Stage::Ceo => &self.ceo,
        }
    }

    fn stage_record_mut(&mut self, stage: Stage) -> &mut StageRecord {
        match stage {
            Stage::Lmro => &mut self.lmro,
            Stage::Dlmro => &mut self.dlmro,
            Stage::Ceo => &mut self.ceo,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Validates that `stage` could be approved right now, without mutating
    /// anything. The service runs this before paying for a document upload;
    /// [`Self::approve_stage`] re-checks the same rules before committing.
    pub fn check_advance(&self, stage: Stage) -> Result<(), WorkflowError> {
        if self.is_terminal() {
            return Err(WorkflowError::AlreadyFinalized(self.status));
        }
        if self.current_stage != stage.marker() {
            return Err(WorkflowError::StageMismatch {
                current: self.current_stage,
                submitted: stage,
            });
        }
        // unreachable when stage sequencing holds, checked anyway
        if let Some(prev) = stage.predecessor() {
            if !self.stage_record(prev).approved {
                return Err(WorkflowError::PredecessorNotApproved(prev));
            }
        }
        Ok(())
    }

    /// Records a stage approval and advances the pipeline. The freshly stored
    /// document supersedes the predecessor stage's one, which is removed from
    /// the record and handed back for blob cleanup.
    pub fn approve_stage(
        &mut self,
        stage: Stage,
        approved_by: ActorId,
        document: Document,
        notes: Option<String>,
        now: TimeStamp<Utc>,
    ) -> Result<AdvanceOutcome, WorkflowError> {
        self.check_advance(stage)?;

        let superseded = stage
            .predecessor()
            .and_then(|prev| self.stage_record_mut(prev).document.take());

        let record = self.stage_record_mut(stage);
        record.approved = true;
        record.approved_by = Some(approved_by);
        record.approved_at = Some(now.clone());
        record.notes = notes;
        record.document = Some(document);

        let next = stage.advanced();
        self.current_stage = next;

        let completed = next == ApprovalStage::Completed;
        if completed {
            self.status = ApprovalStatus::Completed;
            self.completed_at = Some(now);
        }

        Ok(AdvanceOutcome {
            next,
            superseded,
            completed,
        })
    }

    /// Short-circuits the pipeline to Rejected. Stored documents are kept as
    /// the audit trail.
    pub fn reject_with(
        &mut self,
        rejected_by: ActorId,
        reason: impl Into<String>,
        now: TimeStamp<Utc>,
    ) -> Result<(), WorkflowError> {
        if self.is_terminal() {
            return Err(WorkflowError::AlreadyFinalized(self.status));
        }
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(WorkflowError::ReasonRequired);
        }

        self.status = ApprovalStatus::Rejected;
        self.current_stage = ApprovalStage::Rejected;
        self.rejection = Some(Rejection {
            reason,
            rejected_by,
            rejected_at: now,
        });
        Ok(())
    }
}
