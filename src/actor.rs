//! Actors and the capability set used for stage authorization.
//!
//! Authorization is a flat capability lookup: each review stage of each
//! workflow maps to exactly one capability, and `WorkflowAdmin` bypasses the
//! per-stage check everywhere.

use crate::types::{ActorId, Stage, WorkflowKind};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    KycLmro,
    KycDlmro,
    KycCeo,
    BraLmro,
    BraDlmro,
    BraCeo,
    WorkflowAdmin,
}

impl Capability {
    /// The capability required to act at `stage` of a `kind` workflow.
    pub fn for_stage(kind: WorkflowKind, stage: Stage) -> Capability {
        match (kind, stage) {
            (WorkflowKind::Kyc, Stage::Lmro) => Capability::KycLmro,
            (WorkflowKind::Kyc, Stage::Dlmro) => Capability::KycDlmro,
            (WorkflowKind::Kyc, Stage::Ceo) => Capability::KycCeo,
            (WorkflowKind::Bra, Stage::Lmro) => Capability::BraLmro,
            (WorkflowKind::Bra, Stage::Dlmro) => Capability::BraDlmro,
            (WorkflowKind::Bra, Stage::Ceo) => Capability::BraCeo,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::KycLmro => write!(f, "kyc-lmro"),
            Capability::KycDlmro => write!(f, "kyc-dlmro"),
            Capability::KycCeo => write!(f, "kyc-ceo"),
            Capability::BraLmro => write!(f, "bra-lmro"),
            Capability::BraDlmro => write!(f, "bra-dlmro"),
            Capability::BraCeo => write!(f, "bra-ceo"),
            Capability::WorkflowAdmin => write!(f, "workflow-admin"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,
    capabilities: BTreeSet<Capability>,
}

impl Actor {
    pub fn new(id: impl Into<ActorId>) -> Self {
        Self {
            id: id.into(),
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn is_admin(&self) -> bool {
        self.capabilities.contains(&Capability::WorkflowAdmin)
    }
}
