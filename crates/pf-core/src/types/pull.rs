use crate::types::enums::PullStatus;
use crate::types::ids::{PullId, WorkflowId};
use crate::types::workflow::RepoRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub id: PullId,
    pub workflow_id: WorkflowId,
    pub repo: RepoRef,
    pub number: u64,
    pub url: String,
    pub branch: String,
    pub head_sha: Option<String>,
    pub status: PullStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
