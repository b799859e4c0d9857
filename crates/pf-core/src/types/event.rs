use crate::types::enums::{ApprovalKind, CiConclusion, Stage, WorkflowState};
use crate::types::ids::{PatchSetId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Events fed into the transition function. Closed union: the machine
/// pattern-matches exhaustively, unknown combinations are a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum TransitionEvent {
    PatchesProposed {
        patch_set_ids: Vec<PatchSetId>,
    },
    PolicyEvaluated {
        patch_set_id: PatchSetId,
        has_blocking_violations: bool,
    },
    ApprovalRecorded {
        kind: ApprovalKind,
    },
    UserRejected {
        reason: String,
    },
    PatchSetApplied {
        patch_set_id: PatchSetId,
        pr_number: Option<u64>,
    },
    JobFailed {
        job: String,
        error: String,
    },
    CiStarted {
        head_sha: String,
    },
    CiCompleted {
        conclusion: CiConclusion,
        evidence_url: Option<String>,
    },
    PrMerged {
        number: u64,
    },
    PrClosed {
        number: u64,
    },
    StageCompleted {
        stage: Stage,
    },
    StageApproved {
        stage: Stage,
    },
}

impl TransitionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PatchesProposed { .. } => "PatchesProposed",
            Self::PolicyEvaluated { .. } => "PolicyEvaluated",
            Self::ApprovalRecorded { .. } => "ApprovalRecorded",
            Self::UserRejected { .. } => "UserRejected",
            Self::PatchSetApplied { .. } => "PatchSetApplied",
            Self::JobFailed { .. } => "JobFailed",
            Self::CiStarted { .. } => "CiStarted",
            Self::CiCompleted { .. } => "CiCompleted",
            Self::PrMerged { .. } => "PrMerged",
            Self::PrClosed { .. } => "PrClosed",
            Self::StageCompleted { .. } => "StageCompleted",
            Self::StageApproved { .. } => "StageApproved",
        }
    }
}

impl fmt::Display for TransitionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Jobs the machine asks the external dispatcher to enqueue. Typed union
/// instead of string-keyed routing; the dispatch boundary converts to an
/// `EnqueueIntent` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Job {
    ProposePatches {
        workflow_id: WorkflowId,
    },
    EvaluatePolicy {
        workflow_id: WorkflowId,
        patch_set_id: PatchSetId,
    },
    ApplyPatchSet {
        workflow_id: WorkflowId,
        patch_set_id: PatchSetId,
    },
    VerifyCi {
        workflow_id: WorkflowId,
    },
    RunFeasibility {
        workflow_id: WorkflowId,
    },
    RunArchitecture {
        workflow_id: WorkflowId,
    },
    RunTimeline {
        workflow_id: WorkflowId,
    },
}

impl Job {
    pub fn queue(&self) -> &'static str {
        match self {
            Self::ProposePatches { .. }
            | Self::RunFeasibility { .. }
            | Self::RunArchitecture { .. }
            | Self::RunTimeline { .. } => "proposer",
            Self::EvaluatePolicy { .. } => "policy",
            Self::ApplyPatchSet { .. } => "apply",
            Self::VerifyCi { .. } => "ci",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ProposePatches { .. } => "propose_patches",
            Self::EvaluatePolicy { .. } => "evaluate_policy",
            Self::ApplyPatchSet { .. } => "apply_patch_set",
            Self::VerifyCi { .. } => "verify_ci",
            Self::RunFeasibility { .. } => "run_feasibility",
            Self::RunArchitecture { .. } => "run_architecture",
            Self::RunTimeline { .. } => "run_timeline",
        }
    }

    pub fn intent(&self) -> EnqueueIntent {
        EnqueueIntent {
            queue: self.queue().to_string(),
            name: self.name().to_string(),
            payload: serde_json::to_value(self).unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueIntent {
    pub queue: String,
    pub name: String,
    pub payload: Value,
}

/// Audit bodies appended to the event log. Append-only: records are never
/// mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum AuditBody {
    WorkflowCreated {
        workflow_id: WorkflowId,
    },
    WorkflowTransitioned {
        workflow_id: WorkflowId,
        from: WorkflowState,
        to: WorkflowState,
        event: TransitionEvent,
        reason: String,
    },
    PatchSetsProposed {
        workflow_id: WorkflowId,
        patch_set_ids: Vec<PatchSetId>,
    },
    PolicyEvaluated {
        workflow_id: WorkflowId,
        patch_set_id: PatchSetId,
        verdict: crate::types::enums::PolicyVerdict,
        violation_count: u32,
    },
    ApprovalRecorded {
        workflow_id: WorkflowId,
        kind: ApprovalKind,
        approved_by: Option<String>,
    },
    PatchSetApplied {
        workflow_id: WorkflowId,
        patch_set_id: PatchSetId,
        pr_number: Option<u64>,
    },
    CiEvidenceRecorded {
        workflow_id: WorkflowId,
        conclusion: CiConclusion,
        raw_conclusion: String,
        evidence_urls: Vec<String>,
        gates_passed: bool,
    },
}
