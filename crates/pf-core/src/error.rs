use crate::types::enums::WorkflowState;
use thiserror::Error;

/// Error code the state machine recognizes to route a failed apply to
/// `BlockedPolicy` instead of `Failed`.
pub const WRITE_BLOCKED_NO_APPROVAL: &str = "WRITE_BLOCKED_NO_APPROVAL";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    #[error("find text not found in {path}")]
    FindNotFound { path: String },
    #[error("ambiguous match in {path}: {occurrences} occurrences")]
    AmbiguousFind { path: String, occurrences: usize },
    #[error("malformed diff: {message}")]
    Malformed { message: String },
    #[error("context mismatch: {}", mismatches.join("; "))]
    ContextMismatch { mismatches: Vec<String> },
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid secret pattern {name}: {message}")]
    InvalidPattern { name: String, message: String },
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("{WRITE_BLOCKED_NO_APPROVAL}: no {kind} approval recorded for {workflow_id}")]
    BlockedNoApproval { workflow_id: String, kind: String },
    #[error("remote call failed: {message}")]
    Remote { message: String },
}

impl WriteError {
    pub fn is_no_approval(&self) -> bool {
        matches!(self, Self::BlockedNoApproval { .. })
    }
}

#[derive(Debug, Error)]
pub enum CiError {
    #[error("invalid ci event: {message}")]
    InvalidEvent { message: String },
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow not found")]
    NotFound,
    #[error("patch set not found")]
    PatchSetNotFound,
    #[error("workflow in terminal state {state:?}")]
    Terminal { state: WorkflowState },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found")]
    NotFound,
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("backend error: {message}")]
    Backend { message: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Ci(#[from] CiError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("internal error: {message}")]
    Internal { message: String },
}
