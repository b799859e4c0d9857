pub mod approval;
pub mod context;
pub mod enums;
pub mod event;
pub mod ids;
pub mod io;
pub mod patch;
pub mod policy;
pub mod pull;
pub mod workflow;

pub use approval::Approval;
pub use context::{TransitionContext, TransitionResult};
pub use enums::{
    ApprovalKind, CiConclusion, PatchSetStatus, PolicyVerdict, PullStatus, RiskLevel, Severity,
    Stage, StageStatus, WorkflowState,
};
pub use event::{AuditBody, EnqueueIntent, Job, TransitionEvent};
pub use ids::{ApprovalId, IdError, PatchId, PatchSetId, PullId, ViolationId, WorkflowId};
pub use io::{CreateWorkflowInput, PatchInput, ProposePatchSetInput};
pub use patch::{Patch, PatchSet};
pub use policy::{PolicyConfig, PolicyFinding, PolicyReport, PolicyViolation, SecretPattern};
pub use pull::PullRequestRecord;
pub use workflow::{RepoRef, Workflow};
