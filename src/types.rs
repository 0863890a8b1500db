//! Core identifier, time, and stage types shared across the workflow engine.
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

pub type JobId = String;
pub type ActorId = String;
pub type ObjectId = String;

/// The two approval pipelines. They share one state machine and differ only
/// in which job statuses gate and follow them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum WorkflowKind {
    #[n(0)]
    Kyc,
    #[n(1)]
    Bra,
}

impl WorkflowKind {
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowKind::Kyc => "KYC",
            WorkflowKind::Bra => "BRA",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowKind::Kyc => write!(f, "kyc"),
            WorkflowKind::Bra => write!(f, "bra"),
        }
    }
}

/// A sequential human-review checkpoint. Callers name the stage they believe
/// is active when submitting an approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, minicbor::Encode, minicbor::Decode)]
pub enum Stage {
    #[n(0)]
    Lmro,
    #[n(1)]
    Dlmro,
    #[n(2)]
    Ceo,
}

impl Stage {
    /// The stage that must already hold an approval before this one may act.
    pub fn predecessor(self) -> Option<Stage> {
        match self {
            Stage::Lmro => None,
            Stage::Dlmro => Some(Stage::Lmro),
            Stage::Ceo => Some(Stage::Dlmro),
        }
    }

    /// Where the approval lands once this stage signs off.
    pub fn advanced(self) -> ApprovalStage {
        match self {
            Stage::Lmro => ApprovalStage::Dlmro,
            Stage::Dlmro => ApprovalStage::Ceo,
            Stage::Ceo => ApprovalStage::Completed,
        }
    }

    pub fn marker(self) -> ApprovalStage {
        match self {
            Stage::Lmro => ApprovalStage::Lmro,
            Stage::Dlmro => ApprovalStage::Dlmro,
            Stage::Ceo => ApprovalStage::Ceo,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Lmro => write!(f, "LMRO"),
            Stage::Dlmro => write!(f, "DLMRO"),
            Stage::Ceo => write!(f, "CEO"),
        }
    }
}

/// Position of an approval in its pipeline, including the terminal markers.
/// Kept consistent with [`ApprovalStatus`] at every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum ApprovalStage {
    #[n(0)]
    Lmro,
    #[n(1)]
    Dlmro,
    #[n(2)]
    Ceo,
    #[n(3)]
    Completed,
    #[n(4)]
    Rejected,
}

impl ApprovalStage {
    /// The actionable stage this marker corresponds to, if the pipeline is
    /// still live.
    pub fn as_review_stage(self) -> Option<Stage> {
        match self {
            ApprovalStage::Lmro => Some(Stage::Lmro),
            ApprovalStage::Dlmro => Some(Stage::Dlmro),
            ApprovalStage::Ceo => Some(Stage::Ceo),
            ApprovalStage::Completed | ApprovalStage::Rejected => None,
        }
    }
}

impl fmt::Display for ApprovalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStage::Lmro => write!(f, "LMRO"),
            ApprovalStage::Dlmro => write!(f, "DLMRO"),
            ApprovalStage::Ceo => write!(f, "CEO"),
            ApprovalStage::Completed => write!(f, "completed"),
            ApprovalStage::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum ApprovalStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    InProgress,
    #[n(2)]
    Completed,
    #[n(3)]
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ApprovalStatus::Completed | ApprovalStatus::Rejected)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::InProgress => write!(f, "in-progress"),
            ApprovalStatus::Completed => write!(f, "completed"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl fmt::Display for TimeStamp<Utc> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
