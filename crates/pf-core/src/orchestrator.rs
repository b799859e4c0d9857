use crate::applicator::AppliedPatchSet;
use crate::approvals::ApprovalRepository;
use crate::audit::AuditRepository;
use crate::ci::{self, CiEventInput, QualityGate};
use crate::diff;
use crate::error::{PipelineError, WorkflowError};
use crate::machine;
use crate::patch_sets::PatchSetRepository;
use crate::pulls::PullRepository;
use crate::store::Store;
use crate::types::approval::Approval;
use crate::types::context::TransitionResult;
use crate::types::enums::{
    ApprovalKind, PatchSetStatus, PolicyVerdict, PullStatus, Stage, StageStatus, WorkflowState,
};
use crate::types::event::{AuditBody, EnqueueIntent, Job, TransitionEvent};
use crate::types::ids::{ApprovalId, PatchId, PatchSetId, PullId, ViolationId, WorkflowId};
use crate::types::io::{CreateWorkflowInput, ProposePatchSetInput};
use crate::types::patch::{Patch, PatchSet};
use crate::types::policy::{PolicyReport, PolicyViolation};
use crate::types::pull::PullRequestRecord;
use crate::types::workflow::Workflow;
use crate::types::TransitionContext;
use crate::violations::ViolationRepository;
use crate::workflows::WorkflowRepository;
use chrono::Utc;
use pf_events::bus::EventBus;
use pf_events::types::{EventRecord, EventSource};

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub source: EventSource,
    pub correlation_id: Option<String>,
}

impl RequestContext {
    pub fn api() -> Self {
        Self {
            source: EventSource::Api,
            correlation_id: None,
        }
    }

    pub fn worker() -> Self {
        Self {
            source: EventSource::Worker,
            correlation_id: None,
        }
    }

    pub fn webhook() -> Self {
        Self {
            source: EventSource::Webhook,
            correlation_id: None,
        }
    }

    pub fn with_correlation(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// What a single transition produced: the state it left, the machine's
/// decision, and the jobs to hand to the dispatcher.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub from: WorkflowState,
    pub result: TransitionResult,
    pub intents: Vec<EnqueueIntent>,
}

/// Front door for every mutation. Each operation runs inside a single
/// store transaction: persist the triggering fact first, then run the
/// transition over a fresh snapshot, then append the audit trail. Bus
/// publication happens only after the transaction returns.
pub struct Orchestrator<S: Store> {
    store: S,
    bus: EventBus,
}

impl<S: Store> Orchestrator<S> {
    pub fn new(store: S, bus: EventBus) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn create_workflow(
        &self,
        ctx: &RequestContext,
        input: CreateWorkflowInput,
    ) -> Result<(Workflow, Vec<EnqueueIntent>), PipelineError> {
        if input.goal.trim().is_empty() {
            return Err(WorkflowError::InvalidInput {
                message: "goal must not be empty".to_string(),
            }
            .into());
        }
        if input.repos.is_empty() {
            return Err(WorkflowError::InvalidInput {
                message: "at least one repo is required".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let workflow = Workflow {
            id: WorkflowId::generate(),
            goal: input.goal,
            feedback: None,
            repos: input.repos,
            state: WorkflowState::Ingested,
            stage: input.gated.then_some(Stage::Feasibility),
            stage_status: input.gated.then_some(StageStatus::Running),
            created_at: now,
            updated_at: now,
        };

        let (workflow, records) = self.store.with_tx(|store| {
            let workflow = store.workflows().create(workflow.clone())?;
            let record = append_audit(
                store,
                ctx,
                &AuditBody::WorkflowCreated {
                    workflow_id: workflow.id.clone(),
                },
            )?;
            Ok((workflow, vec![record]))
        })?;
        self.publish_all(records);

        let seed = if workflow.is_gated() {
            Job::RunFeasibility {
                workflow_id: workflow.id.clone(),
            }
        } else {
            Job::ProposePatches {
                workflow_id: workflow.id.clone(),
            }
        };
        tracing::info!(workflow_id = %workflow.id, gated = workflow.is_gated(), "workflow created");
        Ok((workflow, vec![seed.intent()]))
    }

    pub fn propose_patch_sets(
        &self,
        ctx: &RequestContext,
        workflow_id: &WorkflowId,
        inputs: Vec<ProposePatchSetInput>,
    ) -> Result<(Vec<PatchSet>, TransitionOutcome), PipelineError> {
        if inputs.is_empty() {
            return Err(WorkflowError::InvalidInput {
                message: "at least one patch set is required".to_string(),
            }
            .into());
        }

        let (sets, outcome, records) = self.store.with_tx(|store| {
            let workflow = live_workflow(store, workflow_id)?;
            let mut sets = Vec::with_capacity(inputs.len());
            for input in &inputs {
                let now = Utc::now();
                let mut patches = Vec::with_capacity(input.patches.len());
                for patch in &input.patches {
                    let (additions, deletions) = patch_counts(&patch.diff)?;
                    patches.push(Patch {
                        id: PatchId::generate(),
                        title: patch.title.clone(),
                        diff: patch.diff.clone(),
                        additions,
                        deletions,
                        risk: patch.risk,
                        adds_tests: patch.adds_tests,
                    });
                }
                let set = store.patch_sets().create(PatchSet {
                    id: PatchSetId::generate(),
                    workflow_id: workflow.id.clone(),
                    repo: input.repo.clone(),
                    title: input.title.clone(),
                    base_sha: input.base_sha.clone(),
                    status: PatchSetStatus::Proposed,
                    policy_verdict: None,
                    patches,
                    created_at: now,
                    updated_at: now,
                })?;
                sets.push(set);
            }

            let patch_set_ids: Vec<PatchSetId> = sets.iter().map(|set| set.id.clone()).collect();
            let proposed = append_audit(
                store,
                ctx,
                &AuditBody::PatchSetsProposed {
                    workflow_id: workflow.id.clone(),
                    patch_set_ids: patch_set_ids.clone(),
                },
            )?;
            let (outcome, transitioned) = apply_transition(
                store,
                ctx,
                &workflow,
                TransitionEvent::PatchesProposed { patch_set_ids },
            )?;
            Ok((sets, outcome, vec![proposed, transitioned]))
        })?;
        self.publish_all(records);
        Ok((sets, outcome))
    }

    pub fn record_policy_report(
        &self,
        ctx: &RequestContext,
        patch_set_id: &PatchSetId,
        report: &PolicyReport,
    ) -> Result<TransitionOutcome, PipelineError> {
        let (outcome, records) = self.store.with_tx(|store| {
            let set = store
                .patch_sets()
                .get(patch_set_id)?
                .ok_or(WorkflowError::PatchSetNotFound)?;
            let workflow = store
                .workflows()
                .get(&set.workflow_id)?
                .ok_or(WorkflowError::NotFound)?;

            for finding in &report.violations {
                store.violations().record(PolicyViolation {
                    id: ViolationId::generate(),
                    patch_set_id: set.id.clone(),
                    rule: finding.rule.clone(),
                    severity: finding.severity,
                    file: finding.file.clone(),
                    message: finding.message.clone(),
                    line: finding.line,
                    evidence: finding.evidence.clone(),
                    created_at: Utc::now(),
                })?;
            }
            store
                .patch_sets()
                .set_policy_verdict(patch_set_id, report.verdict)?;

            let evaluated = append_audit(
                store,
                ctx,
                &AuditBody::PolicyEvaluated {
                    workflow_id: workflow.id.clone(),
                    patch_set_id: set.id.clone(),
                    verdict: report.verdict,
                    violation_count: u32::try_from(report.violations.len()).unwrap_or(u32::MAX),
                },
            )?;
            let (outcome, transitioned) = apply_transition(
                store,
                ctx,
                &workflow,
                TransitionEvent::PolicyEvaluated {
                    patch_set_id: set.id,
                    has_blocking_violations: report.has_blocking_violations(),
                },
            )?;
            Ok((outcome, vec![evaluated, transitioned]))
        })?;
        self.publish_all(records);
        Ok(outcome)
    }

    pub fn record_approval(
        &self,
        ctx: &RequestContext,
        workflow_id: &WorkflowId,
        kind: ApprovalKind,
        approved_by: Option<String>,
        note: Option<String>,
    ) -> Result<TransitionOutcome, PipelineError> {
        let (outcome, records) = self.store.with_tx(|store| {
            let workflow = live_workflow(store, workflow_id)?;
            store.approvals().record(Approval {
                id: ApprovalId::generate(),
                workflow_id: workflow.id.clone(),
                kind,
                approved_by: approved_by.clone(),
                note: note.clone(),
                created_at: Utc::now(),
            })?;

            if kind == ApprovalKind::ApplyPatches {
                for set in store.patch_sets().list_for_workflow(&workflow.id)? {
                    let eligible = set.status == PatchSetStatus::Proposed
                        && matches!(
                            set.policy_verdict,
                            Some(PolicyVerdict::Pass | PolicyVerdict::Warn)
                        );
                    if eligible {
                        store
                            .patch_sets()
                            .set_status(&set.id, PatchSetStatus::Approved)?;
                    }
                }
            }

            let recorded = append_audit(
                store,
                ctx,
                &AuditBody::ApprovalRecorded {
                    workflow_id: workflow.id.clone(),
                    kind,
                    approved_by: approved_by.clone(),
                },
            )?;
            let (outcome, transitioned) = apply_transition(
                store,
                ctx,
                &workflow,
                TransitionEvent::ApprovalRecorded { kind },
            )?;
            Ok((outcome, vec![recorded, transitioned]))
        })?;
        self.publish_all(records);
        Ok(outcome)
    }

    pub fn record_patch_set_applied(
        &self,
        ctx: &RequestContext,
        patch_set_id: &PatchSetId,
        applied: &AppliedPatchSet,
    ) -> Result<TransitionOutcome, PipelineError> {
        let (outcome, records) = self.store.with_tx(|store| {
            let set = store
                .patch_sets()
                .get(patch_set_id)?
                .ok_or(WorkflowError::PatchSetNotFound)?;
            let workflow = store
                .workflows()
                .get(&set.workflow_id)?
                .ok_or(WorkflowError::NotFound)?;

            store
                .patch_sets()
                .set_status(&set.id, PatchSetStatus::Applied)?;
            let now = Utc::now();
            store.pulls().record(PullRequestRecord {
                id: PullId::generate(),
                workflow_id: workflow.id.clone(),
                repo: set.repo.clone(),
                number: applied.pull.number,
                url: applied.pull.url.clone(),
                branch: applied.branch.clone(),
                head_sha: applied.commits.last().cloned(),
                status: PullStatus::Open,
                created_at: now,
                updated_at: now,
            })?;

            let recorded = append_audit(
                store,
                ctx,
                &AuditBody::PatchSetApplied {
                    workflow_id: workflow.id.clone(),
                    patch_set_id: set.id.clone(),
                    pr_number: Some(applied.pull.number),
                },
            )?;
            let (outcome, transitioned) = apply_transition(
                store,
                ctx,
                &workflow,
                TransitionEvent::PatchSetApplied {
                    patch_set_id: set.id,
                    pr_number: Some(applied.pull.number),
                },
            )?;
            Ok((outcome, vec![recorded, transitioned]))
        })?;
        self.publish_all(records);
        Ok(outcome)
    }

    /// Updates the pull record and feeds the matching close event through
    /// the machine.
    pub fn record_pull_closed(
        &self,
        ctx: &RequestContext,
        workflow_id: &WorkflowId,
        number: u64,
        merged: bool,
    ) -> Result<TransitionOutcome, PipelineError> {
        let (outcome, records) = self.store.with_tx(|store| {
            let workflow = store
                .workflows()
                .get(workflow_id)?
                .ok_or(WorkflowError::NotFound)?;
            let status = if merged {
                PullStatus::Merged
            } else {
                PullStatus::Closed
            };
            if let Some(pull) = store
                .pulls()
                .list_for_workflow(&workflow.id)?
                .into_iter()
                .find(|pull| pull.number == number)
            {
                store.pulls().set_status(&pull.id, status)?;
            }
            let event = if merged {
                TransitionEvent::PrMerged { number }
            } else {
                TransitionEvent::PrClosed { number }
            };
            let (outcome, transitioned) = apply_transition(store, ctx, &workflow, event)?;
            Ok((outcome, vec![transitioned]))
        })?;
        self.publish_all(records);
        Ok(outcome)
    }

    /// Ingests a raw CI event. Returns `Ok(None)` when the event matches no
    /// known workflow.
    pub fn record_ci_event(
        &self,
        ctx: &RequestContext,
        input: &CiEventInput,
        gates: &[&dyn QualityGate],
    ) -> Result<Option<TransitionOutcome>, PipelineError> {
        let (outcome, records) = self.store.with_tx(|store| {
            let Some((workflow_id, event)) = ci::process_ci_event(store, input, gates)? else {
                return Ok((None, Vec::new()));
            };
            let workflow = store
                .workflows()
                .get(&workflow_id)?
                .ok_or(WorkflowError::NotFound)?;
            let (outcome, transitioned) = apply_transition(store, ctx, &workflow, event)?;
            Ok((Some(outcome), vec![transitioned]))
        })?;
        self.publish_all(records);
        Ok(outcome)
    }

    pub fn reject(
        &self,
        ctx: &RequestContext,
        workflow_id: &WorkflowId,
        reason: impl Into<String>,
    ) -> Result<TransitionOutcome, PipelineError> {
        self.handle_event(
            ctx,
            workflow_id,
            TransitionEvent::UserRejected {
                reason: reason.into(),
            },
        )
    }

    /// Generic entry point for events with no extra fact to persist:
    /// rejections, CI starts, stage completions, job failures.
    pub fn handle_event(
        &self,
        ctx: &RequestContext,
        workflow_id: &WorkflowId,
        event: TransitionEvent,
    ) -> Result<TransitionOutcome, PipelineError> {
        let (outcome, records) = self.store.with_tx(|store| {
            let workflow = store
                .workflows()
                .get(workflow_id)?
                .ok_or(WorkflowError::NotFound)?;
            let (outcome, transitioned) = apply_transition(store, ctx, &workflow, event)?;
            Ok((outcome, vec![transitioned]))
        })?;
        self.publish_all(records);
        Ok(outcome)
    }

    fn publish_all(&self, records: Vec<EventRecord>) {
        for record in records {
            // No subscribers is not an error.
            let _ = self.bus.publish(record);
        }
    }
}

fn live_workflow<S: Store>(store: &S, id: &WorkflowId) -> Result<Workflow, PipelineError> {
    let workflow = store.workflows().get(id)?.ok_or(WorkflowError::NotFound)?;
    if workflow.state.is_terminal() {
        return Err(WorkflowError::Terminal {
            state: workflow.state,
        }
        .into());
    }
    Ok(workflow)
}

fn patch_counts(diff_content: &str) -> Result<(u32, u32), PipelineError> {
    let parsed = diff::parse_unified_diff(diff_content)?;
    let additions = parsed.files.iter().map(|file| file.additions).sum();
    let deletions = parsed.files.iter().map(|file| file.deletions).sum();
    Ok((additions, deletions))
}

/// Rebuilds the snapshot the machine consumes. Always computed fresh from
/// the store inside the same transaction as the triggering fact.
fn load_context<S: Store>(
    store: &S,
    workflow: &Workflow,
) -> Result<TransitionContext, PipelineError> {
    let sets = store.patch_sets().list_for_workflow(&workflow.id)?;
    let mut needing_policy = Vec::new();
    let mut needing_approval = Vec::new();
    let mut approved = Vec::new();
    let mut applied = Vec::new();
    for set in &sets {
        match set.status {
            PatchSetStatus::Proposed => match set.policy_verdict {
                None => needing_policy.push(set.id.clone()),
                Some(PolicyVerdict::Pass | PolicyVerdict::Warn) => {
                    needing_approval.push(set.id.clone());
                }
                Some(PolicyVerdict::Fail) => {}
            },
            PatchSetStatus::Approved => approved.push(set.id.clone()),
            PatchSetStatus::Applied => applied.push(set.id.clone()),
        }
    }
    let all_applied = !sets.is_empty() && applied.len() == sets.len();
    let open_pr = store
        .pulls()
        .list_for_workflow(&workflow.id)?
        .into_iter()
        .find(|pull| pull.status == PullStatus::Open)
        .map(|pull| pull.number);

    Ok(TransitionContext {
        total_patch_sets: u32::try_from(sets.len()).unwrap_or(u32::MAX),
        needing_policy,
        needing_approval,
        approved,
        applied,
        all_applied,
        stage: workflow.stage,
        stage_status: workflow.stage_status,
        open_pr,
    })
}

fn apply_transition<S: Store>(
    store: &S,
    ctx: &RequestContext,
    workflow: &Workflow,
    event: TransitionEvent,
) -> Result<(TransitionOutcome, EventRecord), PipelineError> {
    let snapshot = load_context(store, workflow)?;
    let result = machine::transition(&workflow.id, workflow.state, &event, &snapshot);
    let stage = result
        .stage
        .or_else(|| workflow.stage.zip(workflow.stage_status));
    store.workflows().set_state(&workflow.id, result.state, stage)?;

    let record = append_audit(
        store,
        ctx,
        &AuditBody::WorkflowTransitioned {
            workflow_id: workflow.id.clone(),
            from: workflow.state,
            to: result.state,
            event,
            reason: result.reason.clone(),
        },
    )?;
    tracing::info!(
        workflow_id = %workflow.id,
        from = ?workflow.state,
        to = ?result.state,
        jobs = result.jobs.len(),
        reason = %result.reason,
        "workflow transitioned"
    );

    let intents = result.jobs.iter().map(Job::intent).collect();
    Ok((
        TransitionOutcome {
            from: workflow.state,
            result,
            intents,
        },
        record,
    ))
}

fn append_audit<S: Store>(
    store: &S,
    ctx: &RequestContext,
    body: &AuditBody,
) -> Result<EventRecord, PipelineError> {
    let record = EventRecord {
        id: String::new(),
        seq: 0,
        at: Utc::now(),
        correlation_id: ctx.correlation_id.clone(),
        source: ctx.source,
        body: serde_json::to_value(body).map_err(|err| PipelineError::Internal {
            message: err.to_string(),
        })?,
    };
    Ok(store.audit().append(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::types::enums::{CiConclusion, RiskLevel, Severity};
    use crate::types::io::PatchInput;
    use crate::types::policy::PolicyFinding;
    use crate::types::workflow::RepoRef;
    use crate::write_gate::OpenedPull;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemState {
        workflows: HashMap<WorkflowId, Workflow>,
        patch_sets: HashMap<PatchSetId, PatchSet>,
        approvals: Vec<Approval>,
        violations: Vec<PolicyViolation>,
        pulls: Vec<PullRequestRecord>,
        events: Vec<EventRecord>,
    }

    #[derive(Default)]
    struct MemStore {
        state: RefCell<MemState>,
    }

    struct MemWorkflows<'a>(&'a RefCell<MemState>);
    struct MemPatchSets<'a>(&'a RefCell<MemState>);
    struct MemApprovals<'a>(&'a RefCell<MemState>);
    struct MemViolations<'a>(&'a RefCell<MemState>);
    struct MemPulls<'a>(&'a RefCell<MemState>);
    struct MemAudit<'a>(&'a RefCell<MemState>);

    impl WorkflowRepository for MemWorkflows<'_> {
        fn create(&self, workflow: Workflow) -> Result<Workflow, StorageError> {
            self.0
                .borrow_mut()
                .workflows
                .insert(workflow.id.clone(), workflow.clone());
            Ok(workflow)
        }

        fn get(&self, id: &WorkflowId) -> Result<Option<Workflow>, StorageError> {
            Ok(self.0.borrow().workflows.get(id).cloned())
        }

        fn set_state(
            &self,
            id: &WorkflowId,
            state: WorkflowState,
            stage: Option<(Stage, StageStatus)>,
        ) -> Result<Workflow, StorageError> {
            let mut guard = self.0.borrow_mut();
            let workflow = guard.workflows.get_mut(id).ok_or(StorageError::NotFound)?;
            workflow.state = state;
            workflow.stage = stage.map(|(stage, _)| stage);
            workflow.stage_status = stage.map(|(_, status)| status);
            workflow.updated_at = Utc::now();
            Ok(workflow.clone())
        }

        fn set_feedback(&self, id: &WorkflowId, feedback: &str) -> Result<Workflow, StorageError> {
            let mut guard = self.0.borrow_mut();
            let workflow = guard.workflows.get_mut(id).ok_or(StorageError::NotFound)?;
            workflow.feedback = Some(feedback.to_string());
            Ok(workflow.clone())
        }

        fn find_by_base_sha(&self, sha: &str) -> Result<Vec<Workflow>, StorageError> {
            Ok(self
                .0
                .borrow()
                .workflows
                .values()
                .filter(|workflow| workflow.repos.iter().any(|repo| repo.base_sha == sha))
                .cloned()
                .collect())
        }
    }

    impl PatchSetRepository for MemPatchSets<'_> {
        fn create(&self, patch_set: PatchSet) -> Result<PatchSet, StorageError> {
            self.0
                .borrow_mut()
                .patch_sets
                .insert(patch_set.id.clone(), patch_set.clone());
            Ok(patch_set)
        }

        fn get(&self, id: &PatchSetId) -> Result<Option<PatchSet>, StorageError> {
            Ok(self.0.borrow().patch_sets.get(id).cloned())
        }

        fn list_for_workflow(
            &self,
            workflow_id: &WorkflowId,
        ) -> Result<Vec<PatchSet>, StorageError> {
            let mut sets: Vec<PatchSet> = self
                .0
                .borrow()
                .patch_sets
                .values()
                .filter(|set| &set.workflow_id == workflow_id)
                .cloned()
                .collect();
            sets.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
            Ok(sets)
        }

        fn set_status(
            &self,
            id: &PatchSetId,
            status: PatchSetStatus,
        ) -> Result<PatchSet, StorageError> {
            let mut guard = self.0.borrow_mut();
            let set = guard.patch_sets.get_mut(id).ok_or(StorageError::NotFound)?;
            set.status = status;
            set.updated_at = Utc::now();
            Ok(set.clone())
        }

        fn set_policy_verdict(
            &self,
            id: &PatchSetId,
            verdict: PolicyVerdict,
        ) -> Result<PatchSet, StorageError> {
            let mut guard = self.0.borrow_mut();
            let set = guard.patch_sets.get_mut(id).ok_or(StorageError::NotFound)?;
            set.policy_verdict = Some(verdict);
            set.updated_at = Utc::now();
            Ok(set.clone())
        }

        fn find_by_base_sha(&self, sha: &str) -> Result<Vec<PatchSet>, StorageError> {
            Ok(self
                .0
                .borrow()
                .patch_sets
                .values()
                .filter(|set| set.base_sha == sha)
                .cloned()
                .collect())
        }
    }

    impl ApprovalRepository for MemApprovals<'_> {
        fn record(&self, approval: Approval) -> Result<Approval, StorageError> {
            self.0.borrow_mut().approvals.push(approval.clone());
            Ok(approval)
        }

        fn count(
            &self,
            workflow_id: &WorkflowId,
            kind: ApprovalKind,
        ) -> Result<u64, StorageError> {
            Ok(self
                .0
                .borrow()
                .approvals
                .iter()
                .filter(|approval| &approval.workflow_id == workflow_id && approval.kind == kind)
                .count() as u64)
        }

        fn list_for_workflow(
            &self,
            workflow_id: &WorkflowId,
        ) -> Result<Vec<Approval>, StorageError> {
            Ok(self
                .0
                .borrow()
                .approvals
                .iter()
                .filter(|approval| &approval.workflow_id == workflow_id)
                .cloned()
                .collect())
        }
    }

    impl ViolationRepository for MemViolations<'_> {
        fn record(&self, violation: PolicyViolation) -> Result<PolicyViolation, StorageError> {
            self.0.borrow_mut().violations.push(violation.clone());
            Ok(violation)
        }

        fn list_for_patch_set(
            &self,
            patch_set_id: &PatchSetId,
        ) -> Result<Vec<PolicyViolation>, StorageError> {
            Ok(self
                .0
                .borrow()
                .violations
                .iter()
                .filter(|violation| &violation.patch_set_id == patch_set_id)
                .cloned()
                .collect())
        }
    }

    impl PullRepository for MemPulls<'_> {
        fn record(&self, pull: PullRequestRecord) -> Result<PullRequestRecord, StorageError> {
            self.0.borrow_mut().pulls.push(pull.clone());
            Ok(pull)
        }

        fn list_for_workflow(
            &self,
            workflow_id: &WorkflowId,
        ) -> Result<Vec<PullRequestRecord>, StorageError> {
            Ok(self
                .0
                .borrow()
                .pulls
                .iter()
                .filter(|pull| &pull.workflow_id == workflow_id)
                .cloned()
                .collect())
        }

        fn find_by_head_sha(&self, sha: &str) -> Result<Option<PullRequestRecord>, StorageError> {
            Ok(self
                .0
                .borrow()
                .pulls
                .iter()
                .find(|pull| {
                    pull.status == PullStatus::Open && pull.head_sha.as_deref() == Some(sha)
                })
                .cloned())
        }

        fn set_status(
            &self,
            id: &PullId,
            status: PullStatus,
        ) -> Result<PullRequestRecord, StorageError> {
            let mut guard = self.0.borrow_mut();
            let pull = guard
                .pulls
                .iter_mut()
                .find(|pull| &pull.id == id)
                .ok_or(StorageError::NotFound)?;
            pull.status = status;
            pull.updated_at = Utc::now();
            Ok(pull.clone())
        }
    }

    impl AuditRepository for MemAudit<'_> {
        fn append(&self, mut event: EventRecord) -> Result<EventRecord, StorageError> {
            let mut guard = self.0.borrow_mut();
            event.seq = guard.events.len() as i64 + 1;
            event.id = format!("evt_{}", event.seq);
            guard.events.push(event.clone());
            Ok(event)
        }

        fn list(
            &self,
            after: Option<i64>,
            limit: Option<u32>,
        ) -> Result<Vec<EventRecord>, StorageError> {
            let guard = self.0.borrow();
            let mut events: Vec<EventRecord> = guard
                .events
                .iter()
                .filter(|event| after.is_none_or(|after| event.seq > after))
                .cloned()
                .collect();
            if let Some(limit) = limit {
                events.truncate(limit as usize);
            }
            Ok(events)
        }
    }

    impl Store for MemStore {
        type Workflows<'a> = MemWorkflows<'a>;
        type PatchSets<'a> = MemPatchSets<'a>;
        type Approvals<'a> = MemApprovals<'a>;
        type Violations<'a> = MemViolations<'a>;
        type Pulls<'a> = MemPulls<'a>;
        type Audit<'a> = MemAudit<'a>;

        fn workflows(&self) -> Self::Workflows<'_> {
            MemWorkflows(&self.state)
        }

        fn patch_sets(&self) -> Self::PatchSets<'_> {
            MemPatchSets(&self.state)
        }

        fn approvals(&self) -> Self::Approvals<'_> {
            MemApprovals(&self.state)
        }

        fn violations(&self) -> Self::Violations<'_> {
            MemViolations(&self.state)
        }

        fn pulls(&self) -> Self::Pulls<'_> {
            MemPulls(&self.state)
        }

        fn audit(&self) -> Self::Audit<'_> {
            MemAudit(&self.state)
        }

        fn with_tx<F, T>(&self, f: F) -> Result<T, PipelineError>
        where
            F: FnOnce(&Self) -> Result<T, PipelineError>,
        {
            f(self)
        }
    }

    fn orchestrator() -> Orchestrator<MemStore> {
        Orchestrator::new(MemStore::default(), EventBus::new(16))
    }

    fn repo() -> RepoRef {
        RepoRef {
            owner: "acme".to_string(),
            name: "widgets".to_string(),
            default_branch: "main".to_string(),
            base_sha: "abc123".to_string(),
        }
    }

    fn create_diff(path: &str) -> String {
        format!(
            "diff --git a/{path} b/{path}\nnew file mode 100644\n--- /dev/null\n+++ b/{path}\n@@ -0,0 +1,2 @@\n+fn added() {{}}\n+\n"
        )
    }

    fn proposal(title: &str, path: &str) -> ProposePatchSetInput {
        ProposePatchSetInput {
            repo: repo(),
            title: title.to_string(),
            base_sha: "abc123".to_string(),
            patches: vec![PatchInput {
                title: format!("add {path}"),
                diff: create_diff(path),
                risk: RiskLevel::Low,
                adds_tests: false,
            }],
        }
    }

    fn passing_report() -> PolicyReport {
        PolicyReport {
            verdict: PolicyVerdict::Pass,
            violations: Vec::new(),
            summary: "no findings".to_string(),
        }
    }

    fn applied(number: u64, head: &str) -> AppliedPatchSet {
        AppliedPatchSet {
            branch: format!("patchflow/test-{number}"),
            commits: vec![head.to_string()],
            pull: OpenedPull {
                url: format!("https://example.test/pulls/{number}"),
                number,
            },
        }
    }

    #[test]
    fn create_workflow_seeds_proposer_and_audits() {
        let orch = orchestrator();
        let ctx = RequestContext::api();
        let (workflow, intents) = orch
            .create_workflow(
                &ctx,
                CreateWorkflowInput {
                    goal: "upgrade widget codec".to_string(),
                    repos: vec![repo()],
                    gated: false,
                },
            )
            .unwrap();

        assert_eq!(workflow.state, WorkflowState::Ingested);
        assert!(!workflow.is_gated());
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].name, "propose_patches");

        let events = orch.store().audit().list(None, None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seq, 1);
    }

    #[test]
    fn gated_workflow_starts_in_feasibility() {
        let orch = orchestrator();
        let (workflow, intents) = orch
            .create_workflow(
                &RequestContext::api(),
                CreateWorkflowInput {
                    goal: "migrate storage layer".to_string(),
                    repos: vec![repo()],
                    gated: true,
                },
            )
            .unwrap();

        assert_eq!(workflow.stage, Some(Stage::Feasibility));
        assert_eq!(workflow.stage_status, Some(StageStatus::Running));
        assert_eq!(intents[0].name, "run_feasibility");
    }

    #[test]
    fn empty_goal_is_rejected() {
        let orch = orchestrator();
        let err = orch
            .create_workflow(
                &RequestContext::api(),
                CreateWorkflowInput {
                    goal: "  ".to_string(),
                    repos: vec![repo()],
                    gated: false,
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Workflow(WorkflowError::InvalidInput { .. })
        ));
    }

    #[test]
    fn happy_path_reaches_done() {
        let orch = orchestrator();
        let ctx = RequestContext::api();
        let (workflow, _) = orch
            .create_workflow(
                &ctx,
                CreateWorkflowInput {
                    goal: "ship the fix".to_string(),
                    repos: vec![repo()],
                    gated: false,
                },
            )
            .unwrap();

        let (sets, outcome) = orch
            .propose_patch_sets(
                &ctx,
                &workflow.id,
                vec![proposal("codec fix", "src/a.rs"), proposal("docs", "src/b.rs")],
            )
            .unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(outcome.result.state, WorkflowState::PatchesProposed);
        assert_eq!(outcome.intents.len(), 2);

        let worker = RequestContext::worker();
        let first = orch
            .record_policy_report(&worker, &sets[0].id, &passing_report())
            .unwrap();
        assert_eq!(first.result.state, WorkflowState::PatchesProposed);
        let second = orch
            .record_policy_report(&worker, &sets[1].id, &passing_report())
            .unwrap();
        assert_eq!(second.result.state, WorkflowState::WaitingUserApproval);

        let approved = orch
            .record_approval(
                &ctx,
                &workflow.id,
                ApprovalKind::ApplyPatches,
                Some("reviewer".to_string()),
                None,
            )
            .unwrap();
        assert_eq!(approved.result.state, WorkflowState::ApplyingPatches);
        assert_eq!(approved.intents.len(), 2);
        for set in orch
            .store()
            .patch_sets()
            .list_for_workflow(&workflow.id)
            .unwrap()
        {
            assert_eq!(set.status, PatchSetStatus::Approved);
        }

        let partial = orch
            .record_patch_set_applied(&worker, &sets[0].id, &applied(11, "head11"))
            .unwrap();
        assert_eq!(partial.result.state, WorkflowState::ApplyingPatches);
        let all = orch
            .record_patch_set_applied(&worker, &sets[1].id, &applied(12, "head12"))
            .unwrap();
        assert_eq!(all.result.state, WorkflowState::PrOpen);
        assert_eq!(all.intents.len(), 1);
        assert_eq!(all.intents[0].name, "verify_ci");

        let started = orch
            .handle_event(
                &RequestContext::webhook(),
                &workflow.id,
                TransitionEvent::CiStarted {
                    head_sha: "head12".to_string(),
                },
            )
            .unwrap();
        assert_eq!(started.result.state, WorkflowState::VerifyingCi);

        let done = orch
            .handle_event(
                &RequestContext::webhook(),
                &workflow.id,
                TransitionEvent::CiCompleted {
                    conclusion: CiConclusion::Success,
                    evidence_url: None,
                },
            )
            .unwrap();
        assert_eq!(done.result.state, WorkflowState::Done);
    }

    #[test]
    fn blocking_report_routes_to_blocked_policy() {
        let orch = orchestrator();
        let ctx = RequestContext::api();
        let (workflow, _) = orch
            .create_workflow(
                &ctx,
                CreateWorkflowInput {
                    goal: "sneaky change".to_string(),
                    repos: vec![repo()],
                    gated: false,
                },
            )
            .unwrap();
        let (sets, _) = orch
            .propose_patch_sets(&ctx, &workflow.id, vec![proposal("bad", "src/c.rs")])
            .unwrap();

        let report = PolicyReport {
            verdict: PolicyVerdict::Fail,
            violations: vec![PolicyFinding {
                rule: "frozen-path".to_string(),
                severity: Severity::Block,
                file: "CODEOWNERS".to_string(),
                message: "frozen path modified".to_string(),
                line: None,
                evidence: None,
            }],
            summary: "1 blocking finding".to_string(),
        };
        let outcome = orch
            .record_policy_report(&RequestContext::worker(), &sets[0].id, &report)
            .unwrap();
        assert_eq!(outcome.result.state, WorkflowState::BlockedPolicy);

        let stored = orch
            .store()
            .violations()
            .list_for_patch_set(&sets[0].id)
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].rule, "frozen-path");
    }

    #[test]
    fn terminal_workflow_rejects_new_patch_sets() {
        let orch = orchestrator();
        let ctx = RequestContext::api();
        let (workflow, _) = orch
            .create_workflow(
                &ctx,
                CreateWorkflowInput {
                    goal: "abandoned".to_string(),
                    repos: vec![repo()],
                    gated: false,
                },
            )
            .unwrap();
        let rejected = orch
            .handle_event(
                &ctx,
                &workflow.id,
                TransitionEvent::UserRejected {
                    reason: "not needed".to_string(),
                },
            )
            .unwrap();
        assert_eq!(rejected.result.state, WorkflowState::Rejected);

        let err = orch
            .propose_patch_sets(&ctx, &workflow.id, vec![proposal("late", "src/d.rs")])
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Workflow(WorkflowError::Terminal { .. })
        ));
    }

    #[test]
    fn reject_lands_before_the_approval_wait() {
        let orch = orchestrator();
        let ctx = RequestContext::api();
        let (workflow, _) = orch
            .create_workflow(
                &ctx,
                CreateWorkflowInput {
                    goal: "cold feet".to_string(),
                    repos: vec![repo()],
                    gated: false,
                },
            )
            .unwrap();
        orch.propose_patch_sets(&ctx, &workflow.id, vec![proposal("p", "src/f.rs")])
            .unwrap();

        let outcome = orch.reject(&ctx, &workflow.id, "cancelled upstream").unwrap();
        assert_eq!(outcome.result.state, WorkflowState::Rejected);
        assert!(outcome.intents.is_empty());

        let stored = orch.store().workflows().get(&workflow.id).unwrap().unwrap();
        assert_eq!(stored.state, WorkflowState::Rejected);
    }

    #[test]
    fn ci_webhook_resolves_workflow_by_head_sha() {
        let orch = orchestrator();
        let ctx = RequestContext::api();
        let worker = RequestContext::worker();
        let (workflow, _) = orch
            .create_workflow(
                &ctx,
                CreateWorkflowInput {
                    goal: "webhook wiring".to_string(),
                    repos: vec![repo()],
                    gated: false,
                },
            )
            .unwrap();
        let (sets, _) = orch
            .propose_patch_sets(&ctx, &workflow.id, vec![proposal("wire", "src/e.rs")])
            .unwrap();
        orch.record_policy_report(&worker, &sets[0].id, &passing_report())
            .unwrap();
        orch.record_approval(&ctx, &workflow.id, ApprovalKind::ApplyPatches, None, None)
            .unwrap();
        orch.record_patch_set_applied(&worker, &sets[0].id, &applied(7, "deadbeef"))
            .unwrap();

        let input = CiEventInput {
            head_sha: "deadbeef".to_string(),
            raw_conclusion: "success".to_string(),
            source: "workflow_run".to_string(),
            run_url: Some("https://example.test/runs/1".to_string()),
            check_name: None,
        };
        let gates: &[&dyn QualityGate] = &[&ci::ConclusionSuccessGate];
        let outcome = orch
            .record_ci_event(&RequestContext::webhook(), &input, gates)
            .unwrap()
            .expect("workflow should match");
        assert_eq!(outcome.result.state, WorkflowState::Done);

        let unrelated = CiEventInput {
            head_sha: "0000000".to_string(),
            raw_conclusion: "success".to_string(),
            source: "workflow_run".to_string(),
            run_url: None,
            check_name: None,
        };
        assert!(orch
            .record_ci_event(&RequestContext::webhook(), &unrelated, &[])
            .unwrap()
            .is_none());
    }

    #[test]
    fn merged_pull_completes_the_workflow() {
        let orch = orchestrator();
        let ctx = RequestContext::api();
        let worker = RequestContext::worker();
        let (workflow, _) = orch
            .create_workflow(
                &ctx,
                CreateWorkflowInput {
                    goal: "merge path".to_string(),
                    repos: vec![repo()],
                    gated: false,
                },
            )
            .unwrap();
        let (sets, _) = orch
            .propose_patch_sets(&ctx, &workflow.id, vec![proposal("merge", "src/f.rs")])
            .unwrap();
        orch.record_policy_report(&worker, &sets[0].id, &passing_report())
            .unwrap();
        orch.record_approval(&ctx, &workflow.id, ApprovalKind::ApplyPatches, None, None)
            .unwrap();
        orch.record_patch_set_applied(&worker, &sets[0].id, &applied(21, "head21"))
            .unwrap();

        let outcome = orch
            .record_pull_closed(&RequestContext::webhook(), &workflow.id, 21, true)
            .unwrap();
        assert_eq!(outcome.result.state, WorkflowState::Done);
        let pulls = orch.store().pulls().list_for_workflow(&workflow.id).unwrap();
        assert_eq!(pulls[0].status, PullStatus::Merged);
    }
}
