//! Approval constraint configuration: per-stage document policy and the
//! blob-store upload timeout.

use crate::types::Stage;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;
const DEFAULT_ALLOWED_MIME: &[&str] = &["application/pdf", "image/png", "image/jpeg"];

/// What a stage accepts as its supporting document.
#[derive(Debug, Clone)]
pub struct DocumentPolicy {
    pub allowed_mime: Vec<String>,
    pub max_bytes: u64,
}

impl DocumentPolicy {
    pub fn new(allowed_mime: &[&str], max_bytes: u64) -> Self {
        Self {
            allowed_mime: allowed_mime.iter().map(ToString::to_string).collect(),
            max_bytes,
        }
    }

    pub fn allows_mime(&self, mime_type: &str) -> bool {
        self.allowed_mime.iter().any(|m| m == mime_type)
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub lmro_policy: DocumentPolicy,
    pub dlmro_policy: DocumentPolicy,
    pub ceo_policy: DocumentPolicy,
    pub upload_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            lmro_policy: DocumentPolicy::new(DEFAULT_ALLOWED_MIME, 10 * MIB),
            dlmro_policy: DocumentPolicy::new(DEFAULT_ALLOWED_MIME, 10 * MIB),
            // the final sign-off bundles the full case file, so it gets more room
            ceo_policy: DocumentPolicy::new(DEFAULT_ALLOWED_MIME, 25 * MIB),
            upload_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy_for(&self, stage: Stage) -> &DocumentPolicy {
        match stage {
            Stage::Lmro => &self.lmro_policy,
            Stage::Dlmro => &self.dlmro_policy,
            Stage::Ceo => &self.ceo_policy,
        }
    }

    pub fn set_policy(mut self, stage: Stage, policy: DocumentPolicy) -> Self {
        match stage {
            Stage::Lmro => self.lmro_policy = policy,
            Stage::Dlmro => self.dlmro_policy = policy,
            Stage::Ceo => self.ceo_policy = policy,
        }
        self
    }

    pub fn set_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }
}
