use crate::audit::AuditRepository;
use crate::error::PipelineError;
use crate::patch_sets::PatchSetRepository;
use crate::pulls::PullRepository;
use crate::store::Store;
use crate::types::enums::CiConclusion;
use crate::types::event::{AuditBody, TransitionEvent};
use crate::types::ids::WorkflowId;
use crate::workflows::WorkflowRepository;
use chrono::Utc;
use pf_events::types::{EventRecord, EventSource};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiEventInput {
    pub head_sha: String,
    pub raw_conclusion: String,
    pub source: String,
    pub run_url: Option<String>,
    pub check_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiEvidence {
    pub raw_conclusion: String,
    pub conclusion: CiConclusion,
    pub source: String,
    pub evidence_urls: Vec<String>,
}

/// Pure predicate over CI evidence. Gates only observe; they never fetch.
pub trait QualityGate {
    fn name(&self) -> &'static str;
    fn evaluate(&self, evidence: &CiEvidence) -> bool;
}

/// Default gate: the run must have concluded successfully.
pub struct ConclusionSuccessGate;

impl QualityGate for ConclusionSuccessGate {
    fn name(&self) -> &'static str {
        "conclusion-success"
    }

    fn evaluate(&self, evidence: &CiEvidence) -> bool {
        evidence.conclusion == CiConclusion::Success
    }
}

/// Three-way reduction of provider conclusions. `cancelled` and `skipped`
/// are deliberate non-answers; everything else that is not a success is a
/// failure.
pub fn reduce_conclusion(raw: &str) -> CiConclusion {
    match raw.to_ascii_lowercase().as_str() {
        "success" => CiConclusion::Success,
        "cancelled" | "skipped" => CiConclusion::Cancelled,
        _ => CiConclusion::Failure,
    }
}

/// Locates the workflow owning a CI event by head sha: open pull requests
/// first, then workflow and patch-set base commits. `Ok(None)` is the
/// expected outcome for unrelated CI activity.
pub fn find_workflow_for_ci_event<S: Store>(
    store: &S,
    input: &CiEventInput,
) -> Result<Option<WorkflowId>, PipelineError> {
    if let Some(pull) = store.pulls().find_by_head_sha(&input.head_sha)? {
        return Ok(Some(pull.workflow_id));
    }
    if let Some(workflow) = store
        .workflows()
        .find_by_base_sha(&input.head_sha)?
        .into_iter()
        .next()
    {
        return Ok(Some(workflow.id));
    }
    if let Some(patch_set) = store
        .patch_sets()
        .find_by_base_sha(&input.head_sha)?
        .into_iter()
        .next()
    {
        return Ok(Some(patch_set.workflow_id));
    }
    Ok(None)
}

/// Builds the evidence record, runs the quality gates, appends the evidence
/// to the audit log, and returns the transition event for the owning
/// workflow. Returns `Ok(None)` when no workflow matches.
pub fn process_ci_event<S: Store>(
    store: &S,
    input: &CiEventInput,
    gates: &[&dyn QualityGate],
) -> Result<Option<(WorkflowId, TransitionEvent)>, PipelineError> {
    let Some(workflow_id) = find_workflow_for_ci_event(store, input)? else {
        tracing::debug!(head_sha = %input.head_sha, "ci event matched no workflow");
        return Ok(None);
    };

    let evidence = CiEvidence {
        raw_conclusion: input.raw_conclusion.clone(),
        conclusion: reduce_conclusion(&input.raw_conclusion),
        source: input.source.clone(),
        evidence_urls: input.run_url.iter().cloned().collect(),
    };
    let gates_passed = gates.iter().all(|gate| {
        let passed = gate.evaluate(&evidence);
        if !passed {
            tracing::info!(gate = gate.name(), workflow_id = %workflow_id, "quality gate failed");
        }
        passed
    });

    let body = AuditBody::CiEvidenceRecorded {
        workflow_id: workflow_id.clone(),
        conclusion: evidence.conclusion,
        raw_conclusion: evidence.raw_conclusion.clone(),
        evidence_urls: evidence.evidence_urls.clone(),
        gates_passed,
    };
    let record = EventRecord {
        id: String::new(),
        seq: 0,
        at: Utc::now(),
        correlation_id: None,
        source: EventSource::Webhook,
        body: serde_json::to_value(&body).map_err(|err| PipelineError::Internal {
            message: err.to_string(),
        })?,
    };
    store.audit().append(record)?;

    let event = TransitionEvent::CiCompleted {
        conclusion: evidence.conclusion,
        evidence_url: input.run_url.clone(),
    };
    Ok(Some((workflow_id, event)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conclusion_reduction_table() {
        assert_eq!(reduce_conclusion("success"), CiConclusion::Success);
        assert_eq!(reduce_conclusion("cancelled"), CiConclusion::Cancelled);
        assert_eq!(reduce_conclusion("skipped"), CiConclusion::Cancelled);
        assert_eq!(reduce_conclusion("failure"), CiConclusion::Failure);
        assert_eq!(reduce_conclusion("neutral"), CiConclusion::Failure);
        assert_eq!(reduce_conclusion("timed_out"), CiConclusion::Failure);
        assert_eq!(reduce_conclusion("action_required"), CiConclusion::Failure);
        assert_eq!(reduce_conclusion("SUCCESS"), CiConclusion::Success);
    }

    #[test]
    fn default_gate_requires_success() {
        let gate = ConclusionSuccessGate;
        let mut evidence = CiEvidence {
            raw_conclusion: "success".to_string(),
            conclusion: CiConclusion::Success,
            source: "workflow_run".to_string(),
            evidence_urls: Vec::new(),
        };
        assert!(gate.evaluate(&evidence));
        evidence.conclusion = CiConclusion::Failure;
        assert!(!gate.evaluate(&evidence));
    }
}
