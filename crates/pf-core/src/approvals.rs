use crate::error::StorageError;
use crate::types::approval::Approval;
use crate::types::enums::ApprovalKind;
use crate::types::ids::WorkflowId;
use crate::write_gate::ApprovalLookup;

/// Approvals are recorded facts: counted by the write gate, never consumed
/// or decremented.
pub trait ApprovalRepository {
    fn record(&self, approval: Approval) -> Result<Approval, StorageError>;
    fn count(&self, workflow_id: &WorkflowId, kind: ApprovalKind) -> Result<u64, StorageError>;
    fn list_for_workflow(&self, workflow_id: &WorkflowId) -> Result<Vec<Approval>, StorageError>;
}

impl<T: ApprovalRepository> ApprovalLookup for T {
    fn count_approvals(
        &self,
        workflow_id: &WorkflowId,
        kind: ApprovalKind,
    ) -> Result<u64, StorageError> {
        self.count(workflow_id, kind)
    }
}
