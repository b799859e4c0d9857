use crate::types::enums::{Stage, StageStatus, WorkflowState};
use crate::types::event::Job;
use crate::types::ids::PatchSetId;
use serde::{Deserialize, Serialize};

/// Snapshot assembled immediately before each transition call. Recomputed
/// fresh every time; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionContext {
    pub total_patch_sets: u32,
    pub needing_policy: Vec<PatchSetId>,
    pub needing_approval: Vec<PatchSetId>,
    pub approved: Vec<PatchSetId>,
    pub applied: Vec<PatchSetId>,
    pub all_applied: bool,
    pub stage: Option<Stage>,
    pub stage_status: Option<StageStatus>,
    pub open_pr: Option<u64>,
}

impl TransitionContext {
    pub fn policy_passed(&self) -> u32 {
        self.total_patch_sets
            .saturating_sub(u32::try_from(self.needing_policy.len()).unwrap_or(u32::MAX))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub state: WorkflowState,
    pub stage: Option<(Stage, StageStatus)>,
    pub jobs: Vec<Job>,
    pub reason: String,
}

impl TransitionResult {
    pub fn stay(state: WorkflowState, reason: impl Into<String>) -> Self {
        Self {
            state,
            stage: None,
            jobs: Vec::new(),
            reason: reason.into(),
        }
    }

    pub fn advance(state: WorkflowState, jobs: Vec<Job>, reason: impl Into<String>) -> Self {
        Self {
            state,
            stage: None,
            jobs,
            reason: reason.into(),
        }
    }
}
