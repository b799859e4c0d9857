use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum WorkflowState {
    Ingested,
    PatchesProposed,
    WaitingUserApproval,
    ApplyingPatches,
    PrOpen,
    VerifyingCi,
    Done,
    NeedsHuman,
    BlockedPolicy,
    Failed,
    Rejected,
}

impl WorkflowState {
    pub const ALL: [Self; 11] = [
        Self::Ingested,
        Self::PatchesProposed,
        Self::WaitingUserApproval,
        Self::ApplyingPatches,
        Self::PrOpen,
        Self::VerifyingCi,
        Self::Done,
        Self::NeedsHuman,
        Self::BlockedPolicy,
        Self::Failed,
        Self::Rejected,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Done | Self::NeedsHuman | Self::BlockedPolicy | Self::Failed | Self::Rejected
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Stage {
    Feasibility,
    Architecture,
    Timeline,
    Patches,
    Policy,
    Pr,
    Done,
}

impl Stage {
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Feasibility => Some(Self::Architecture),
            Self::Architecture => Some(Self::Timeline),
            Self::Timeline => Some(Self::Patches),
            Self::Patches => Some(Self::Policy),
            Self::Policy => Some(Self::Pr),
            Self::Pr => Some(Self::Done),
            Self::Done => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StageStatus {
    Running,
    WaitingApproval,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PatchSetStatus {
    Proposed,
    Approved,
    Applied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    ApplyPatches,
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Severity {
    Warn,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PolicyVerdict {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PullStatus {
    Open,
    Merged,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CiConclusion {
    Success,
    Failure,
    Cancelled,
}
