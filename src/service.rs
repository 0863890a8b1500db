//! Service layer API for the approval workflow: binds the state machine to
//! job lifecycle, document storage, and notification fan-out.

use crate::actor::{Actor, Capability};
use crate::approval::Approval;
use crate::blob::{BlobStore, UploadOptions};
use crate::config::WorkflowConfig;
use crate::document::{Document, DocumentUpload};
use crate::error::WorkflowError;
use crate::job::{Job, JobStatus, TimelineEntry};
use crate::notify::{Audience, Notice, NoticeCategory, Notifier};
use crate::store::{CaseStore, StoreError};
use crate::types::{ApprovalStatus, Stage, TimeStamp, WorkflowKind};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, warn};

/// One service instance drives both workflow kinds; all collaborators are
/// injected at construction.
#[derive(Clone)]
pub struct WorkflowService {
    store: Arc<dyn CaseStore>,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,
    config: WorkflowConfig,
}

impl WorkflowService {
    pub fn new(
        store: Arc<dyn CaseStore>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            notifier,
            config,
        }
    }

    /// Start the `kind` workflow for a job. The job must sit in the
    /// predecessor status, and no approval may exist yet for `(job, kind)`;
    /// a rejected one permanently blocks re-initialization.
    pub async fn initialize(
        &self,
        job_id: &str,
        kind: WorkflowKind,
        actor: &Actor,
    ) -> Result<Approval, WorkflowError> {
        let job = self.load_job(job_id).await?;

        let required = JobStatus::workflow_predecessor(kind);
        if job.status != required {
            return Err(WorkflowError::InvalidJobState {
                required,
                actual: job.status,
            });
        }

        if let Some(existing) = self.store.get_approval(job_id, kind).await? {
            return Err(Self::initialize_conflict(&existing));
        }

        let approval = Approval::new(job_id, kind, TimeStamp::new());
        match self.store.create_approval(&approval).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists) => {
                // a racing initializer won; report the live record
                let live = self
                    .store
                    .get_approval(job_id, kind)
                    .await?
                    .ok_or_else(|| WorkflowError::NotFound(format!("{kind} approval")))?;
                return Err(Self::initialize_conflict(&live));
            }
            Err(err) => return Err(err.into()),
        }

        let pending = JobStatus::workflow_pending(kind);
        self.store
            .update_job_status(
                job_id,
                pending,
                TimelineEntry::new(
                    pending,
                    format!("{} workflow initialized", kind.label()),
                    actor.id.clone(),
                ),
            )
            .await?;

        info!(job_id, kind = %kind, actor = %actor.id, "workflow initialized");

        self.dispatch(
            Notice {
                title: format!("{} review requested", kind.label()),
                body: format!("job {job_id} is ready for {} review", Stage::Lmro),
                category: NoticeCategory::WorkflowStarted,
                job_id: job_id.to_string(),
            },
            Audience::Role(Capability::for_stage(kind, Stage::Lmro)),
        )
        .await;

        Ok(approval)
    }

    /// Approve the named stage with a fresh supporting document, advancing
    /// the pipeline. Completing the CEO stage of KYC also chains BRA
    /// initialization.
    pub async fn advance(
        &self,
        job_id: &str,
        kind: WorkflowKind,
        stage: Stage,
        actor: &Actor,
        upload: DocumentUpload,
        notes: Option<String>,
    ) -> Result<Approval, WorkflowError> {
        let job = self.load_job(job_id).await?;
        let mut approval = self.load_approval(job_id, kind).await?;

        // all preconditions run before the upload is paid for
        approval.check_advance(stage)?;
        self.authorize(actor, kind, stage)?;
        let prepared = upload.validate_and_finalise(self.config.policy_for(stage))?;

        let opts = UploadOptions {
            folder: format!("{kind}/{job_id}/{stage}"),
            file_name: prepared.file_name.clone(),
            mime_type: prepared.mime_type.clone(),
        };
        let handle = match timeout(
            self.config.upload_timeout,
            self.blobs.upload(&prepared.bytes, &opts),
        )
        .await
        {
            Ok(Ok(handle)) => handle,
            Ok(Err(err)) => return Err(WorkflowError::StorageUnavailable(err.to_string())),
            Err(_) => {
                return Err(WorkflowError::StorageUnavailable(format!(
                    "upload timed out after {}s",
                    self.config.upload_timeout.as_secs()
                )));
            }
        };

        let document = Document {
            url: handle.url,
            file_name: prepared.file_name,
            mime_type: prepared.mime_type,
            storage_id: handle.object_id.clone(),
            checksum: prepared.checksum,
            uploaded_at: TimeStamp::new(),
            uploaded_by: actor.id.clone(),
        };
        let notes = notes.filter(|n| !n.trim().is_empty());
        let outcome = match approval.approve_stage(
            stage,
            actor.id.clone(),
            document,
            notes,
            TimeStamp::new(),
        ) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.discard_blob(job_id, &handle.object_id).await;
                return Err(err);
            }
        };

        if let Err(err) = self.store.save_approval(&approval, stage).await {
            // the upload went through but the record did not; reclaim the blob
            self.discard_blob(job_id, &handle.object_id).await;
            return Err(err.into());
        }

        // the new document supersedes the predecessor stage's one
        if let Some(old) = &outcome.superseded {
            self.discard_blob(job_id, &old.storage_id).await;
        }

        let status = JobStatus::after_stage(kind, stage);
        let description = if outcome.completed {
            format!("{} workflow completed", kind.label())
        } else {
            format!("{} {} stage approved", kind.label(), stage)
        };
        self.store
            .update_job_status(
                job_id,
                status,
                TimelineEntry::new(status, description, actor.id.clone()),
            )
            .await?;

        info!(
            job_id,
            kind = %kind,
            stage = %stage,
            next = %outcome.next,
            actor = %actor.id,
            "stage approved"
        );

        if outcome.completed {
            let notice = Notice {
                title: format!("{} workflow completed", kind.label()),
                body: format!("job {job_id} cleared the {} workflow", kind.label()),
                category: NoticeCategory::WorkflowCompleted,
                job_id: job_id.to_string(),
            };
            self.dispatch(notice.clone(), Audience::User(job.assignee.clone()))
                .await;
            self.dispatch(notice, Audience::Role(Capability::WorkflowAdmin))
                .await;
        } else if let Some(next) = outcome.next.as_review_stage() {
            self.dispatch(
                Notice {
                    title: format!("{} {} approved", kind.label(), stage),
                    body: format!("job {job_id} is awaiting {next} review"),
                    category: NoticeCategory::StageAdvanced,
                    job_id: job_id.to_string(),
                },
                Audience::Role(Capability::for_stage(kind, next)),
            )
            .await;
        }

        // workflow continuity: a finished KYC hands the job straight to BRA
        if outcome.completed && kind == WorkflowKind::Kyc {
            if let Err(err) = self.initialize(job_id, WorkflowKind::Bra, actor).await {
                warn!(job_id, error = %err, "automatic BRA initialization failed");
            }
        }

        Ok(approval)
    }

    /// Reject the workflow from its current stage. Stored stage documents are
    /// kept as the audit trail.
    pub async fn reject(
        &self,
        job_id: &str,
        kind: WorkflowKind,
        actor: &Actor,
        reason: &str,
    ) -> Result<Approval, WorkflowError> {
        let job = self.load_job(job_id).await?;
        let mut approval = self.load_approval(job_id, kind).await?;

        let Some(active_stage) = approval.current_stage.as_review_stage() else {
            return Err(WorkflowError::AlreadyFinalized(approval.status));
        };
        self.authorize(actor, kind, active_stage)?;

        approval.reject_with(actor.id.clone(), reason, TimeStamp::new())?;
        self.store.save_approval(&approval, active_stage).await?;

        let status = JobStatus::workflow_rejected(kind);
        self.store
            .update_job_status(
                job_id,
                status,
                TimelineEntry::new(
                    status,
                    format!("{} workflow rejected: {reason}", kind.label()),
                    actor.id.clone(),
                ),
            )
            .await?;

        info!(job_id, kind = %kind, actor = %actor.id, "workflow rejected");

        let notice = Notice {
            title: format!("{} workflow rejected", kind.label()),
            body: format!("job {job_id} was rejected: {reason}"),
            category: NoticeCategory::WorkflowRejected,
            job_id: job_id.to_string(),
        };
        self.dispatch(notice.clone(), Audience::User(job.assignee.clone()))
            .await;
        self.dispatch(notice, Audience::Role(Capability::WorkflowAdmin))
            .await;

        Ok(approval)
    }

    async fn load_job(&self, job_id: &str) -> Result<Job, WorkflowError> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("job {job_id}")))
    }

    async fn load_approval(
        &self,
        job_id: &str,
        kind: WorkflowKind,
    ) -> Result<Approval, WorkflowError> {
        self.store
            .get_approval(job_id, kind)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("{kind} approval for job {job_id}")))
    }

    fn authorize(
        &self,
        actor: &Actor,
        kind: WorkflowKind,
        stage: Stage,
    ) -> Result<(), WorkflowError> {
        let required = Capability::for_stage(kind, stage);
        if actor.has_capability(required) || actor.is_admin() {
            Ok(())
        } else {
            Err(WorkflowError::Unauthorized { required })
        }
    }

    fn initialize_conflict(existing: &Approval) -> WorkflowError {
        if existing.status == ApprovalStatus::Rejected {
            WorkflowError::AlreadyRejected
        } else {
            WorkflowError::AlreadyInitialized {
                stage: existing.current_stage,
            }
        }
    }

    async fn dispatch(&self, notice: Notice, audience: Audience) {
        if let Err(err) = self.notifier.notify(&notice, &audience).await {
            warn!(job_id = %notice.job_id, error = %err, "notification dropped");
        }
    }

    async fn discard_blob(&self, job_id: &str, object_id: &str) {
        if let Err(err) = self.blobs.delete(object_id).await {
            warn!(job_id, object_id, error = %err, "best-effort blob delete failed");
        }
    }
}
