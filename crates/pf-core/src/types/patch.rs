use crate::types::enums::{PatchSetStatus, PolicyVerdict, RiskLevel};
use crate::types::ids::{PatchId, PatchSetId, WorkflowId};
use crate::types::workflow::RepoRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSet {
    pub id: PatchSetId,
    pub workflow_id: WorkflowId,
    pub repo: RepoRef,
    pub title: String,
    pub base_sha: String,
    pub status: PatchSetStatus,
    pub policy_verdict: Option<PolicyVerdict>,
    pub patches: Vec<Patch>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub id: PatchId,
    pub title: String,
    pub diff: String,
    pub additions: u32,
    pub deletions: u32,
    pub risk: RiskLevel,
    pub adds_tests: bool,
}
