use crate::approvals::ApprovalRepository;
use crate::audit::AuditRepository;
use crate::error::PipelineError;
use crate::patch_sets::PatchSetRepository;
use crate::pulls::PullRepository;
use crate::violations::ViolationRepository;
use crate::workflows::WorkflowRepository;

pub trait Store {
    type Workflows<'a>: WorkflowRepository
    where
        Self: 'a;
    type PatchSets<'a>: PatchSetRepository
    where
        Self: 'a;
    type Approvals<'a>: ApprovalRepository
    where
        Self: 'a;
    type Violations<'a>: ViolationRepository
    where
        Self: 'a;
    type Pulls<'a>: PullRepository
    where
        Self: 'a;
    type Audit<'a>: AuditRepository
    where
        Self: 'a;

    fn workflows(&self) -> Self::Workflows<'_>;
    fn patch_sets(&self) -> Self::PatchSets<'_>;
    fn approvals(&self) -> Self::Approvals<'_>;
    fn violations(&self) -> Self::Violations<'_>;
    fn pulls(&self) -> Self::Pulls<'_>;
    fn audit(&self) -> Self::Audit<'_>;

    fn with_tx<F, T>(&self, f: F) -> Result<T, PipelineError>
    where
        F: FnOnce(&Self) -> Result<T, PipelineError>;
}
