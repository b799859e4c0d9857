use crate::error::WRITE_BLOCKED_NO_APPROVAL;
use crate::types::context::{TransitionContext, TransitionResult};
use crate::types::enums::{
    ApprovalKind, CiConclusion, Stage, StageStatus, WorkflowState,
};
use crate::types::event::{Job, TransitionEvent};
use crate::types::ids::WorkflowId;

/// The transition function. Pure, total, deterministic: it never performs
/// I/O, never fails, and always returns a result. Terminal states absorb
/// every event.
pub fn transition(
    workflow_id: &WorkflowId,
    current: WorkflowState,
    event: &TransitionEvent,
    ctx: &TransitionContext,
) -> TransitionResult {
    if current.is_terminal() {
        return TransitionResult::stay(
            current,
            format!("no transition: {current:?} is terminal"),
        );
    }

    if let TransitionEvent::JobFailed { job, error } = event {
        return if error.contains(WRITE_BLOCKED_NO_APPROVAL) {
            TransitionResult::advance(
                WorkflowState::BlockedPolicy,
                Vec::new(),
                format!("job {job} blocked: write attempted without approval"),
            )
        } else {
            TransitionResult::advance(
                WorkflowState::Failed,
                Vec::new(),
                format!("job {job} failed: {error}"),
            )
        };
    }

    if matches!(
        event,
        TransitionEvent::StageApproved { .. } | TransitionEvent::StageCompleted { .. }
    ) {
        if let (Some(stage), Some(status)) = (ctx.stage, ctx.stage_status) {
            let staged = stage_transition(workflow_id, stage, status, event, ctx);
            return TransitionResult {
                state: current,
                stage: Some((staged.stage, staged.status)),
                jobs: staged.jobs,
                reason: staged.reason,
            };
        }
        return TransitionResult::stay(current, "stage event for ungated workflow".to_string());
    }

    // User rejection is accepted from any live state, not just the approval
    // wait: an operator can pull the plug while policy or CI is in flight.
    if let TransitionEvent::UserRejected { reason } = event {
        return TransitionResult::advance(
            WorkflowState::Rejected,
            Vec::new(),
            format!("rejected by user: {reason}"),
        );
    }

    let result = per_state(workflow_id, current, event, ctx);

    // Cross-cutting rule, checked after per-state handling: a blocking
    // policy verdict always wins, whatever state we were in.
    if let TransitionEvent::PolicyEvaluated {
        patch_set_id,
        has_blocking_violations: true,
    } = event
    {
        return TransitionResult::advance(
            WorkflowState::BlockedPolicy,
            Vec::new(),
            format!("policy blocked by violations in {patch_set_id}"),
        );
    }

    result
}

fn per_state(
    workflow_id: &WorkflowId,
    current: WorkflowState,
    event: &TransitionEvent,
    ctx: &TransitionContext,
) -> TransitionResult {
    use WorkflowState as S;

    match (current, event) {
        (S::Ingested, TransitionEvent::PatchesProposed { patch_set_ids }) => {
            let jobs: Vec<Job> = ctx
                .needing_policy
                .iter()
                .map(|patch_set_id| Job::EvaluatePolicy {
                    workflow_id: workflow_id.clone(),
                    patch_set_id: patch_set_id.clone(),
                })
                .collect();
            TransitionResult::advance(
                S::PatchesProposed,
                jobs,
                format!("{} patch sets proposed", patch_set_ids.len()),
            )
        }
        (
            S::PatchesProposed,
            TransitionEvent::PolicyEvaluated {
                has_blocking_violations: false,
                ..
            },
        ) => {
            if ctx.needing_policy.is_empty() {
                TransitionResult::advance(
                    S::WaitingUserApproval,
                    Vec::new(),
                    format!(
                        "policy passed for all {} patch sets",
                        ctx.total_patch_sets
                    ),
                )
            } else {
                TransitionResult::stay(
                    current,
                    format!(
                        "policy passed for {} of {} patch sets",
                        ctx.policy_passed(),
                        ctx.total_patch_sets
                    ),
                )
            }
        }
        (
            S::WaitingUserApproval,
            TransitionEvent::ApprovalRecorded {
                kind: ApprovalKind::ApplyPatches,
            },
        ) => {
            let jobs: Vec<Job> = ctx
                .approved
                .iter()
                .map(|patch_set_id| Job::ApplyPatchSet {
                    workflow_id: workflow_id.clone(),
                    patch_set_id: patch_set_id.clone(),
                })
                .collect();
            TransitionResult::advance(
                S::ApplyingPatches,
                jobs,
                format!("apply approved for {} patch sets", ctx.approved.len()),
            )
        }
        (S::ApplyingPatches, TransitionEvent::PatchSetApplied { patch_set_id, .. }) => {
            if ctx.all_applied {
                TransitionResult::advance(
                    S::PrOpen,
                    vec![Job::VerifyCi {
                        workflow_id: workflow_id.clone(),
                    }],
                    format!("all {} patch sets applied", ctx.total_patch_sets),
                )
            } else {
                TransitionResult::stay(
                    current,
                    format!(
                        "applied {} of {} patch sets ({patch_set_id} done)",
                        ctx.applied.len(),
                        ctx.total_patch_sets
                    ),
                )
            }
        }
        (S::PrOpen, TransitionEvent::CiStarted { head_sha }) => TransitionResult::advance(
            S::VerifyingCi,
            Vec::new(),
            format!("ci run started for {head_sha}"),
        ),
        (S::PrOpen | S::VerifyingCi, TransitionEvent::CiCompleted { conclusion, .. }) => {
            match conclusion {
                CiConclusion::Success => TransitionResult::advance(
                    S::Done,
                    Vec::new(),
                    "ci succeeded".to_string(),
                ),
                CiConclusion::Failure => TransitionResult::advance(
                    S::NeedsHuman,
                    Vec::new(),
                    "ci failed, human attention required".to_string(),
                ),
                CiConclusion::Cancelled => TransitionResult::advance(
                    S::NeedsHuman,
                    Vec::new(),
                    "ci cancelled, human attention required".to_string(),
                ),
            }
        }
        (S::PrOpen | S::VerifyingCi, TransitionEvent::PrMerged { number }) => {
            TransitionResult::advance(
                S::Done,
                Vec::new(),
                format!("pull request #{number} merged"),
            )
        }
        (S::PrOpen | S::VerifyingCi, TransitionEvent::PrClosed { number }) => {
            TransitionResult::advance(
                S::Rejected,
                Vec::new(),
                format!("pull request #{number} closed without merge"),
            )
        }
        _ => TransitionResult::stay(
            current,
            format!("no transition for {event} in state {current:?}"),
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTransition {
    pub stage: Stage,
    pub status: StageStatus,
    pub jobs: Vec<Job>,
    pub reason: String,
}

/// Gated-pipeline variant: ordered stages, each independently approvable.
/// Approving a stage advances to the next one and enqueues that stage's
/// work.
pub fn stage_transition(
    workflow_id: &WorkflowId,
    current: Stage,
    status: StageStatus,
    event: &TransitionEvent,
    ctx: &TransitionContext,
) -> StageTransition {
    match event {
        TransitionEvent::StageCompleted { stage }
            if *stage == current && status == StageStatus::Running =>
        {
            StageTransition {
                stage: current,
                status: StageStatus::WaitingApproval,
                jobs: Vec::new(),
                reason: format!("stage {current:?} complete, awaiting approval"),
            }
        }
        TransitionEvent::StageApproved { stage }
            if *stage == current && status == StageStatus::WaitingApproval =>
        {
            match current.next() {
                Some(next) => {
                    let jobs = stage_entry_jobs(workflow_id, next, ctx);
                    let status = if next == Stage::Done {
                        StageStatus::Complete
                    } else {
                        StageStatus::Running
                    };
                    StageTransition {
                        stage: next,
                        status,
                        jobs,
                        reason: format!("stage {current:?} approved, entering {next:?}"),
                    }
                }
                None => StageTransition {
                    stage: current,
                    status: StageStatus::Complete,
                    jobs: Vec::new(),
                    reason: "pipeline already complete".to_string(),
                },
            }
        }
        _ => StageTransition {
            stage: current,
            status,
            jobs: Vec::new(),
            reason: format!(
                "no stage transition for {event} in {current:?} ({status:?})"
            ),
        },
    }
}

fn stage_entry_jobs(workflow_id: &WorkflowId, stage: Stage, ctx: &TransitionContext) -> Vec<Job> {
    match stage {
        Stage::Feasibility => vec![Job::RunFeasibility {
            workflow_id: workflow_id.clone(),
        }],
        Stage::Architecture => vec![Job::RunArchitecture {
            workflow_id: workflow_id.clone(),
        }],
        Stage::Timeline => vec![Job::RunTimeline {
            workflow_id: workflow_id.clone(),
        }],
        Stage::Patches => vec![Job::ProposePatches {
            workflow_id: workflow_id.clone(),
        }],
        // One evaluation job per patch set still needing it, never a
        // single batched job.
        Stage::Policy => ctx
            .needing_policy
            .iter()
            .map(|patch_set_id| Job::EvaluatePolicy {
                workflow_id: workflow_id.clone(),
                patch_set_id: patch_set_id.clone(),
            })
            .collect(),
        Stage::Pr => ctx
            .approved
            .iter()
            .map(|patch_set_id| Job::ApplyPatchSet {
                workflow_id: workflow_id.clone(),
                patch_set_id: patch_set_id.clone(),
            })
            .collect(),
        Stage::Done => Vec::new(),
    }
}
