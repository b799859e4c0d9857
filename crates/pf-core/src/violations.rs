use crate::error::StorageError;
use crate::types::ids::PatchSetId;
use crate::types::policy::PolicyViolation;

/// Append-only audit trail of policy findings; no update or delete.
pub trait ViolationRepository {
    fn record(&self, violation: PolicyViolation) -> Result<PolicyViolation, StorageError>;
    fn list_for_patch_set(
        &self,
        patch_set_id: &PatchSetId,
    ) -> Result<Vec<PolicyViolation>, StorageError>;
}
