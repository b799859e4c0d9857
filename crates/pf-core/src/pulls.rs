use crate::error::StorageError;
use crate::types::enums::PullStatus;
use crate::types::ids::{PullId, WorkflowId};
use crate::types::pull::PullRequestRecord;

pub trait PullRepository {
    fn record(&self, pull: PullRequestRecord) -> Result<PullRequestRecord, StorageError>;
    fn list_for_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Vec<PullRequestRecord>, StorageError>;
    /// Resolves a head sha to a pull that is still open. Merged and closed
    /// pulls no longer match; their workflows are past caring.
    fn find_by_head_sha(&self, sha: &str) -> Result<Option<PullRequestRecord>, StorageError>;
    fn set_status(&self, id: &PullId, status: PullStatus)
    -> Result<PullRequestRecord, StorageError>;
}
