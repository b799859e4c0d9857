use crate::types::enums::ApprovalKind;
use crate::types::ids::{ApprovalId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub workflow_id: WorkflowId,
    pub kind: ApprovalKind,
    pub approved_by: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
