use crate::error::StorageError;
use crate::types::enums::{PatchSetStatus, PolicyVerdict};
use crate::types::ids::{PatchSetId, WorkflowId};
use crate::types::patch::PatchSet;

pub trait PatchSetRepository {
    fn create(&self, patch_set: PatchSet) -> Result<PatchSet, StorageError>;
    fn get(&self, id: &PatchSetId) -> Result<Option<PatchSet>, StorageError>;
    fn list_for_workflow(&self, workflow_id: &WorkflowId) -> Result<Vec<PatchSet>, StorageError>;
    fn set_status(&self, id: &PatchSetId, status: PatchSetStatus)
    -> Result<PatchSet, StorageError>;
    fn set_policy_verdict(
        &self,
        id: &PatchSetId,
        verdict: PolicyVerdict,
    ) -> Result<PatchSet, StorageError>;
    fn find_by_base_sha(&self, sha: &str) -> Result<Vec<PatchSet>, StorageError>;
}
