use crate::types::enums::{Stage, StageStatus, WorkflowState};
use crate::types::ids::WorkflowId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub base_sha: String,
}

impl RepoRef {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub goal: String,
    pub feedback: Option<String>,
    pub repos: Vec<RepoRef>,
    pub state: WorkflowState,
    pub stage: Option<Stage>,
    pub stage_status: Option<StageStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn is_gated(&self) -> bool {
        self.stage.is_some()
    }
}
