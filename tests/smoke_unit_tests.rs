//! Smoke screen unit tests for the approval workflow engine components
//!
//! These tests span the codebase, exercising guard rails, failure
//! partitioning, and race behavior in isolation from the end-to-end
//! scenarios.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

use case_approval::{
    actor::{Actor, Capability},
    blob::{BlobError, BlobHandle, BlobStore, MemoryBlobStore, UploadOptions},
    config::WorkflowConfig,
    document::DocumentUpload,
    error::WorkflowError,
    job::{Job, JobStatus},
    notify::{Audience, LogNotifier, Notice, Notifier},
    service::WorkflowService,
    store::{CaseStore, SledCaseStore},
    types::{ApprovalStage, Stage, WorkflowKind},
    utils::new_uuid_to_bech32,
};

fn service_over(
    dir: &tempfile::TempDir,
    db_name: &str,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,
    config: WorkflowConfig,
) -> anyhow::Result<(Arc<SledCaseStore>, WorkflowService)> {
    let db = sled::open(dir.path().join(db_name))?;
    let store = Arc::new(SledCaseStore::new(Arc::new(db)));
    let service = WorkflowService::new(store.clone(), blobs, notifier, config);
    Ok((store, service))
}

async fn seed_job(store: &SledCaseStore, job_id: &str, status: JobStatus) -> anyhow::Result<()> {
    store
        .put_job(&Job::new(job_id, "user_assignee").with_status(status))
        .await?;
    Ok(())
}

fn pdf_upload(marker: u8) -> DocumentUpload {
    DocumentUpload::new()
        .set_file_name(format!("report_{marker}.pdf"))
        .set_mime_type("application/pdf")
        .set_bytes(vec![marker; 256])
}

fn kyc_lmro() -> Actor {
    Actor::new("user_lmro").with_capability(Capability::KycLmro)
}

// UTILS MODULE TESTS
mod utils_tests {
    use super::*;

    /// bech32 encoding keeps the human-readable prefix intact
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let encoded = new_uuid_to_bech32("job_").unwrap();
        assert!(encoded.starts_with("job_1"));
        assert!(encoded.len() > 10);
    }

    #[test]
    fn handles_empty_hrp() {
        assert!(new_uuid_to_bech32("").is_err());
    }

    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("job_").unwrap();
        let id2 = new_uuid_to_bech32("job_").unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn dedicated_constructors_carry_their_prefix() {
        assert!(case_approval::utils::new_job_id().unwrap().starts_with("job_1"));
        assert!(
            case_approval::utils::new_object_id()
                .unwrap()
                .starts_with("blob_1")
        );
    }
}

// ORCHESTRATOR GUARD TESTS
mod guard_tests {
    use super::*;

    #[tokio::test]
    async fn initialize_requires_the_predecessor_status() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (store, service) = service_over(
            &dir,
            "guard_predecessor.db",
            Arc::new(MemoryBlobStore::new()),
            Arc::new(LogNotifier),
            WorkflowConfig::default(),
        )?;
        seed_job(&store, "job_1", JobStatus::OperationsPending).await?;

        let err = service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await;
        assert!(matches!(
            err,
            Err(WorkflowError::InvalidJobState {
                required: JobStatus::OperationsComplete,
                actual: JobStatus::OperationsPending,
            })
        ));

        // BRA gates on KYC completion, not operations
        seed_job(&store, "job_2", JobStatus::OperationsComplete).await?;
        let err = service
            .initialize("job_2", WorkflowKind::Bra, &Actor::new("user_ops"))
            .await;
        assert!(matches!(err, Err(WorkflowError::InvalidJobState { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn initialize_is_idempotent_per_job_and_kind() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (store, service) = service_over(
            &dir,
            "guard_idempotent.db",
            Arc::new(MemoryBlobStore::new()),
            Arc::new(LogNotifier),
            WorkflowConfig::default(),
        )?;
        seed_job(&store, "job_1", JobStatus::OperationsComplete).await?;

        service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await?;

        // second attempt reports the live record's stage instead of duplicating
        let err = service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await;
        assert!(matches!(
            err,
            Err(WorkflowError::AlreadyInitialized {
                stage: ApprovalStage::Lmro
            })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn rejected_workflow_cannot_be_reinitialized() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (store, service) = service_over(
            &dir,
            "guard_rejected.db",
            Arc::new(MemoryBlobStore::new()),
            Arc::new(LogNotifier),
            WorkflowConfig::default(),
        )?;
        seed_job(&store, "job_1", JobStatus::OperationsComplete).await?;

        service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await?;
        service
            .reject("job_1", WorkflowKind::Kyc, &kyc_lmro(), "forged papers")
            .await?;

        // the job no longer sits in the predecessor status, so reset it to
        // prove the block comes from the rejected approval itself
        seed_job(&store, "job_1", JobStatus::OperationsComplete).await?;
        let err = service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await;
        assert!(matches!(err, Err(WorkflowError::AlreadyRejected)));

        Ok(())
    }

    #[tokio::test]
    async fn advance_without_a_document_changes_nothing() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (store, service) = service_over(
            &dir,
            "guard_document.db",
            Arc::new(MemoryBlobStore::new()),
            Arc::new(LogNotifier),
            WorkflowConfig::default(),
        )?;
        seed_job(&store, "job_1", JobStatus::OperationsComplete).await?;
        service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await?;

        let err = service
            .advance(
                "job_1",
                WorkflowKind::Kyc,
                Stage::Lmro,
                &kyc_lmro(),
                DocumentUpload::new(),
                None,
            )
            .await;
        assert!(matches!(err, Err(WorkflowError::DocumentRequired)));

        let approval = store
            .get_approval("job_1", WorkflowKind::Kyc)
            .await?
            .unwrap();
        assert_eq!(approval.current_stage, ApprovalStage::Lmro);
        assert!(!approval.lmro.approved);

        Ok(())
    }

    #[tokio::test]
    async fn advance_by_the_wrong_role_is_unauthorized() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (store, service) = service_over(
            &dir,
            "guard_role.db",
            Arc::new(MemoryBlobStore::new()),
            Arc::new(LogNotifier),
            WorkflowConfig::default(),
        )?;
        seed_job(&store, "job_1", JobStatus::OperationsComplete).await?;
        service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await?;

        // DLMRO capability does not cover the LMRO stage
        let dlmro = Actor::new("user_dlmro").with_capability(Capability::KycDlmro);
        let err = service
            .advance(
                "job_1",
                WorkflowKind::Kyc,
                Stage::Lmro,
                &dlmro,
                pdf_upload(1),
                None,
            )
            .await;
        assert!(matches!(
            err,
            Err(WorkflowError::Unauthorized {
                required: Capability::KycLmro
            })
        ));

        let approval = store
            .get_approval("job_1", WorkflowKind::Kyc)
            .await?
            .unwrap();
        assert!(!approval.lmro.approved);

        Ok(())
    }

    #[tokio::test]
    async fn admin_bypasses_the_stage_role() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (store, service) = service_over(
            &dir,
            "guard_admin.db",
            Arc::new(MemoryBlobStore::new()),
            Arc::new(LogNotifier),
            WorkflowConfig::default(),
        )?;
        seed_job(&store, "job_1", JobStatus::OperationsComplete).await?;
        service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await?;

        let admin = Actor::new("user_admin").with_capability(Capability::WorkflowAdmin);
        let approval = service
            .advance(
                "job_1",
                WorkflowKind::Kyc,
                Stage::Lmro,
                &admin,
                pdf_upload(1),
                None,
            )
            .await?;

        assert_eq!(approval.current_stage, ApprovalStage::Dlmro);
        assert_eq!(approval.lmro.approved_by.as_deref(), Some("user_admin"));

        Ok(())
    }

    #[tokio::test]
    async fn advance_must_name_the_active_stage() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (store, service) = service_over(
            &dir,
            "guard_stage.db",
            Arc::new(MemoryBlobStore::new()),
            Arc::new(LogNotifier),
            WorkflowConfig::default(),
        )?;
        seed_job(&store, "job_1", JobStatus::OperationsComplete).await?;
        service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await?;

        let dlmro = Actor::new("user_dlmro").with_capability(Capability::KycDlmro);
        let err = service
            .advance(
                "job_1",
                WorkflowKind::Kyc,
                Stage::Dlmro,
                &dlmro,
                pdf_upload(1),
                None,
            )
            .await;
        assert!(matches!(
            err,
            Err(WorkflowError::StageMismatch {
                current: ApprovalStage::Lmro,
                submitted: Stage::Dlmro,
            })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn reject_requires_a_reason_and_the_stage_role() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (store, service) = service_over(
            &dir,
            "guard_reject.db",
            Arc::new(MemoryBlobStore::new()),
            Arc::new(LogNotifier),
            WorkflowConfig::default(),
        )?;
        seed_job(&store, "job_1", JobStatus::OperationsComplete).await?;
        service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await?;

        let err = service
            .reject("job_1", WorkflowKind::Kyc, &kyc_lmro(), "  ")
            .await;
        assert!(matches!(err, Err(WorkflowError::ReasonRequired)));

        let bystander = Actor::new("user_other");
        let err = service
            .reject("job_1", WorkflowKind::Kyc, &bystander, "not convincing")
            .await;
        assert!(matches!(err, Err(WorkflowError::Unauthorized { .. })));

        let err = service
            .advance(
                "job_missing",
                WorkflowKind::Kyc,
                Stage::Lmro,
                &kyc_lmro(),
                pdf_upload(1),
                None,
            )
            .await;
        assert!(matches!(err, Err(WorkflowError::NotFound(_))));

        Ok(())
    }
}

// FAILURE PARTITIONING TESTS
mod failure_tests {
    use super::*;

    /// Blob store that refuses every upload.
    struct FailingBlobStore;

    #[async_trait]
    impl BlobStore for FailingBlobStore {
        async fn upload(&self, _: &[u8], _: &UploadOptions) -> Result<BlobHandle, BlobError> {
            Err(BlobError::Unavailable("connection refused".to_string()))
        }
        async fn delete(&self, _: &str) -> Result<(), BlobError> {
            Err(BlobError::Unavailable("connection refused".to_string()))
        }
    }

    /// Blob store that never answers within a test-sized timeout.
    struct SlowBlobStore;

    #[async_trait]
    impl BlobStore for SlowBlobStore {
        async fn upload(&self, _: &[u8], _: &UploadOptions) -> Result<BlobHandle, BlobError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Err(BlobError::Unavailable("too late anyway".to_string()))
        }
        async fn delete(&self, _: &str) -> Result<(), BlobError> {
            Ok(())
        }
    }

    /// Notifier whose delivery channel is down.
    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _: &Notice, _: &Audience) -> anyhow::Result<()> {
            anyhow::bail!("webhook endpoint returned 503")
        }
    }

    #[tokio::test]
    async fn storage_failure_aborts_the_transition() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (store, service) = service_over(
            &dir,
            "failure_storage.db",
            Arc::new(FailingBlobStore),
            Arc::new(LogNotifier),
            WorkflowConfig::default(),
        )?;
        seed_job(&store, "job_1", JobStatus::OperationsComplete).await?;
        service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await?;

        let err = service
            .advance(
                "job_1",
                WorkflowKind::Kyc,
                Stage::Lmro,
                &kyc_lmro(),
                pdf_upload(1),
                None,
            )
            .await;
        assert!(matches!(err, Err(WorkflowError::StorageUnavailable(_))));

        // nothing was committed; the caller may retry the same stage
        let approval = store
            .get_approval("job_1", WorkflowKind::Kyc)
            .await?
            .unwrap();
        assert_eq!(approval.current_stage, ApprovalStage::Lmro);
        assert!(!approval.lmro.approved);
        assert!(approval.lmro.document.is_none());

        let job = store.get_job("job_1").await?.unwrap();
        assert_eq!(job.status, JobStatus::KycPending);

        Ok(())
    }

    #[tokio::test]
    async fn upload_timeout_surfaces_as_storage_unavailable() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (store, service) = service_over(
            &dir,
            "failure_timeout.db",
            Arc::new(SlowBlobStore),
            Arc::new(LogNotifier),
            WorkflowConfig::default().set_upload_timeout(Duration::from_millis(50)),
        )?;
        seed_job(&store, "job_1", JobStatus::OperationsComplete).await?;
        service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await?;

        let err = service
            .advance(
                "job_1",
                WorkflowKind::Kyc,
                Stage::Lmro,
                &kyc_lmro(),
                pdf_upload(1),
                None,
            )
            .await;
        assert!(matches!(err, Err(WorkflowError::StorageUnavailable(_))));

        let approval = store
            .get_approval("job_1", WorkflowKind::Kyc)
            .await?
            .unwrap();
        assert_eq!(approval.current_stage, ApprovalStage::Lmro);

        Ok(())
    }

    #[tokio::test]
    async fn notifier_failure_never_blocks_the_workflow() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (store, service) = service_over(
            &dir,
            "failure_notify.db",
            Arc::new(MemoryBlobStore::new()),
            Arc::new(FailingNotifier),
            WorkflowConfig::default(),
        )?;
        seed_job(&store, "job_1", JobStatus::OperationsComplete).await?;

        service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await?;
        let approval = service
            .advance(
                "job_1",
                WorkflowKind::Kyc,
                Stage::Lmro,
                &kyc_lmro(),
                pdf_upload(1),
                None,
            )
            .await?;

        assert_eq!(approval.current_stage, ApprovalStage::Dlmro);

        Ok(())
    }
}

// RACE TESTS
mod race_tests {
    use super::*;

    /// Two near-simultaneous submissions for the same stage: exactly one may
    /// win; the loser is told to reload rather than silently losing data.
    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_lmro_submissions_have_a_single_winner() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let blobs = Arc::new(MemoryBlobStore::new());
        let (store, service) = service_over(
            &dir,
            "race_lmro.db",
            blobs.clone(),
            Arc::new(LogNotifier),
            WorkflowConfig::default(),
        )?;
        seed_job(&store, "job_1", JobStatus::OperationsComplete).await?;
        service
            .initialize("job_1", WorkflowKind::Kyc, &Actor::new("user_ops"))
            .await?;

        let svc_a = service.clone();
        let svc_b = service.clone();
        let task_a = tokio::spawn(async move {
            svc_a
                .advance(
                    "job_1",
                    WorkflowKind::Kyc,
                    Stage::Lmro,
                    &kyc_lmro(),
                    pdf_upload(1),
                    None,
                )
                .await
        });
        let task_b = tokio::spawn(async move {
            svc_b
                .advance(
                    "job_1",
                    WorkflowKind::Kyc,
                    Stage::Lmro,
                    &kyc_lmro(),
                    pdf_upload(2),
                    None,
                )
                .await
        });

        let (res_a, res_b) = tokio::join!(task_a, task_b);
        let results = [res_a?, res_b?];

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one submission may advance the stage");

        let loser = results.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            loser,
            Err(WorkflowError::StageMismatch { .. }) | Err(WorkflowError::StaleWriteConflict)
        ));

        let approval = store
            .get_approval("job_1", WorkflowKind::Kyc)
            .await?
            .unwrap();
        assert_eq!(approval.current_stage, ApprovalStage::Dlmro);

        // the losing upload, if it happened, was reclaimed
        assert_eq!(blobs.len(), 1);

        Ok(())
    }
}
