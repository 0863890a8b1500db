//! Notification contract: fire-and-forget fan-out to users or role groups.
//!
//! The orchestrator never lets a notification failure block compliance
//! progress; errors from implementations are logged at the call site and
//! dropped.

use crate::actor::Capability;
use crate::types::{ActorId, JobId};
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeCategory {
    WorkflowStarted,
    StageAdvanced,
    WorkflowCompleted,
    WorkflowRejected,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub category: NoticeCategory,
    pub job_id: JobId,
}

/// Who a notice is addressed to: one user, or every holder of a capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    User(ActorId),
    Role(Capability),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &Notice, audience: &Audience) -> anyhow::Result<()>;
}

/// Notifier that only writes to the log. The default when no delivery
/// channel is wired up.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &Notice, audience: &Audience) -> anyhow::Result<()> {
        match audience {
            Audience::User(user) => info!(
                job_id = %notice.job_id,
                user = %user,
                title = %notice.title,
                "notice"
            ),
            Audience::Role(capability) => info!(
                job_id = %notice.job_id,
                role = %capability,
                title = %notice.title,
                "notice"
            ),
        }
        Ok(())
    }
}
