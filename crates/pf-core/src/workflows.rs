use crate::error::StorageError;
use crate::types::enums::{Stage, StageStatus, WorkflowState};
use crate::types::ids::WorkflowId;
use crate::types::workflow::Workflow;

pub trait WorkflowRepository {
    fn create(&self, workflow: Workflow) -> Result<Workflow, StorageError>;
    fn get(&self, id: &WorkflowId) -> Result<Option<Workflow>, StorageError>;
    fn set_state(
        &self,
        id: &WorkflowId,
        state: WorkflowState,
        stage: Option<(Stage, StageStatus)>,
    ) -> Result<Workflow, StorageError>;
    fn set_feedback(&self, id: &WorkflowId, feedback: &str) -> Result<Workflow, StorageError>;
    fn find_by_base_sha(&self, sha: &str) -> Result<Vec<Workflow>, StorageError>;
}
