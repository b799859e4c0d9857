use crate::types::enums::RiskLevel;
use crate::types::workflow::RepoRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWorkflowInput {
    pub goal: String,
    pub repos: Vec<RepoRef>,
    pub gated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposePatchSetInput {
    pub repo: RepoRef,
    pub title: String,
    pub base_sha: String,
    pub patches: Vec<PatchInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchInput {
    pub title: String,
    pub diff: String,
    pub risk: RiskLevel,
    pub adds_tests: bool,
}
