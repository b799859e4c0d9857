use crate::diff::{
    apply_file_hunks, parse_unified_diff, validate_file_hunks, DiffFile, FileAction,
};
use crate::error::{DiffError, PipelineError, WriteError};
use crate::types::patch::PatchSet;
use crate::types::workflow::RepoRef;
use crate::write_gate::{ApprovalLookup, OpenedPull, RepoHost, WriteGate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPatchSet {
    pub branch: String,
    pub commits: Vec<String>,
    pub pull: OpenedPull,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchApplication {
    pub branch: String,
    pub commits: Vec<String>,
}

/// Application is not transactional: the branch and any commits listed here
/// exist on the remote even though the patch set as a whole failed.
#[derive(Debug, Error)]
#[error("patch set application failed after {} commits: {error}", commits.len())]
pub struct ApplyFailure {
    pub branch: Option<String>,
    pub commits: Vec<String>,
    #[source]
    pub error: PipelineError,
}

impl ApplyFailure {
    pub fn is_no_approval(&self) -> bool {
        matches!(
            &self.error,
            PipelineError::Write(err) if err.is_no_approval()
        )
    }
}

pub struct PatchApplicator<'a, H, A> {
    gate: WriteGate<'a, H, A>,
}

impl<'a, H: RepoHost, A: ApprovalLookup> PatchApplicator<'a, H, A> {
    pub fn new(gate: WriteGate<'a, H, A>) -> Self {
        Self { gate }
    }

    /// Applies one patch set end-to-end: branch, per-file commits, pull
    /// request. Fails fast on the first file error and reports the commits
    /// produced up to that point.
    pub fn apply_patch_set(
        &self,
        patch_set: &PatchSet,
    ) -> Result<AppliedPatchSet, Box<ApplyFailure>> {
        let application = self.apply_to_branch(patch_set)?;
        let repo = &patch_set.repo;
        let body = pull_request_body(patch_set);
        let pull = self
            .gate
            .open_pull_request(
                &repo.owner,
                &repo.name,
                &application.branch,
                &repo.default_branch,
                &patch_set.title,
                &body,
            )
            .map_err(|err| {
                Box::new(ApplyFailure {
                    branch: Some(application.branch.clone()),
                    commits: application.commits.clone(),
                    error: PipelineError::Write(err),
                })
            })?;
        tracing::info!(
            patch_set_id = %patch_set.id,
            pr_number = pull.number,
            "patch set applied and pull request opened"
        );
        Ok(AppliedPatchSet {
            branch: application.branch,
            commits: application.commits,
            pull,
        })
    }

    /// Branch-only variant used for pre-merge sandbox validation: applies
    /// every file but opens no pull request.
    pub fn apply_to_branch(
        &self,
        patch_set: &PatchSet,
    ) -> Result<BranchApplication, Box<ApplyFailure>> {
        let repo = &patch_set.repo;
        let branch = branch_name(patch_set);

        if let Err(err) = self
            .gate
            .create_branch(&repo.owner, &repo.name, &branch, &patch_set.base_sha)
        {
            return Err(Box::new(ApplyFailure {
                branch: None,
                commits: Vec::new(),
                error: PipelineError::Write(err),
            }));
        }

        let mut commits = Vec::new();
        for patch in &patch_set.patches {
            let parsed = match parse_unified_diff(&patch.diff) {
                Ok(parsed) => parsed,
                Err(err) => {
                    return Err(Box::new(ApplyFailure {
                        branch: Some(branch),
                        commits,
                        error: PipelineError::Diff(err),
                    }));
                }
            };
            for file in &parsed.files {
                if let Err(error) = self.apply_file(repo, &branch, &patch.title, file, &mut commits)
                {
                    return Err(Box::new(ApplyFailure {
                        branch: Some(branch),
                        commits,
                        error,
                    }));
                }
            }
        }

        Ok(BranchApplication { branch, commits })
    }

    fn apply_file(
        &self,
        repo: &RepoRef,
        branch: &str,
        patch_title: &str,
        file: &DiffFile,
        commits: &mut Vec<String>,
    ) -> Result<(), PipelineError> {
        let message = format!("{patch_title}: {}", file.path);
        match file.action {
            FileAction::Delete => {
                let current = self
                    .gate
                    .host()
                    .get_file_contents(&repo.owner, &repo.name, &file.path, branch)
                    .map_err(host_error)?;
                let deleted = self.gate.delete_file(
                    &repo.owner,
                    &repo.name,
                    &file.path,
                    &message,
                    &current.sha,
                    branch,
                )?;
                commits.push(deleted.commit_sha);
            }
            FileAction::Create => {
                let content = file.new_file_content();
                let written = self.gate.update_file(
                    &repo.owner,
                    &repo.name,
                    &file.path,
                    &message,
                    &content,
                    None,
                    branch,
                )?;
                commits.push(written.commit_sha);
            }
            FileAction::Modify => {
                let current = self
                    .gate
                    .host()
                    .get_file_contents(&repo.owner, &repo.name, &file.path, branch)
                    .map_err(host_error)?;
                let mismatches = validate_file_hunks(&current.content, file);
                if !mismatches.is_empty() {
                    let mismatches = mismatches
                        .into_iter()
                        .map(|mismatch| format!("{}: {mismatch}", file.path))
                        .collect();
                    return Err(PipelineError::Diff(DiffError::ContextMismatch {
                        mismatches,
                    }));
                }
                let updated = apply_file_hunks(&current.content, file)?;
                let written = self.gate.update_file(
                    &repo.owner,
                    &repo.name,
                    &file.path,
                    &message,
                    &updated,
                    Some(&current.sha),
                    branch,
                )?;
                commits.push(written.commit_sha);
            }
        }
        tracing::debug!(path = %file.path, action = ?file.action, "file applied");
        Ok(())
    }
}

fn branch_name(patch_set: &PatchSet) -> String {
    let set_tag: String = patch_set
        .id
        .as_str()
        .trim_start_matches("ps_")
        .chars()
        .take(8)
        .collect::<String>()
        .to_lowercase();
    format!(
        "patchflow/{set_tag}-{}",
        Ulid::new().to_string().to_lowercase()
    )
}

fn host_error(err: crate::write_gate::HostError) -> PipelineError {
    PipelineError::Write(WriteError::Remote {
        message: err.to_string(),
    })
}

fn pull_request_body(patch_set: &PatchSet) -> String {
    let mut body = String::from("## Patches\n\n");
    for patch in &patch_set.patches {
        body.push_str(&format!(
            "- **{}** (+{} / -{}, risk: {:?}, tests: {})\n",
            patch.title,
            patch.additions,
            patch.deletions,
            patch.risk,
            if patch.adds_tests { "yes" } else { "no" },
        ));
    }
    body.push_str(&format!(
        "\nBase commit: `{}`\nWorkflow: `{}`\n",
        patch_set.base_sha, patch_set.workflow_id
    ));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::generate_unified_diff;
    use crate::types::enums::{PatchSetStatus, RiskLevel};
    use crate::types::ids::{PatchId, PatchSetId, WorkflowId};
    use crate::types::patch::Patch;
    use crate::write_gate::test_support::{FakeHost, FixedApprovals};
    use chrono::Utc;

    fn repo() -> RepoRef {
        RepoRef {
            owner: "acme".to_string(),
            name: "widgets".to_string(),
            default_branch: "main".to_string(),
            base_sha: "base-sha".to_string(),
        }
    }

    fn patch(title: &str, diff: String) -> Patch {
        let parsed = parse_unified_diff(&diff).unwrap();
        let additions = parsed.files.iter().map(|f| f.additions).sum();
        let deletions = parsed.files.iter().map(|f| f.deletions).sum();
        Patch {
            id: PatchId::generate(),
            title: title.to_string(),
            diff,
            additions,
            deletions,
            risk: RiskLevel::Low,
            adds_tests: false,
        }
    }

    fn patch_set(patches: Vec<Patch>) -> PatchSet {
        PatchSet {
            id: PatchSetId::generate(),
            workflow_id: WorkflowId::generate(),
            repo: repo(),
            title: "Fix the widget".to_string(),
            base_sha: "base-sha".to_string(),
            status: PatchSetStatus::Approved,
            policy_verdict: None,
            patches,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn applies_modify_create_and_delete_then_opens_pr() {
        let host = FakeHost::default()
            .with_file("src/lib.rs", "fn a() {}\n")
            .with_file("legacy.rs", "old\n");
        let approvals = FixedApprovals(1);

        let modify = generate_unified_diff(
            "src/lib.rs",
            "fn a() {}\n",
            "fn a() {}\nfn b() {}\n",
            FileAction::Modify,
            None,
        )
        .unwrap()
        .patch;
        let create =
            generate_unified_diff("src/new.rs", "", "pub fn c() {}\n", FileAction::Create, None)
                .unwrap()
                .patch;
        let delete = generate_unified_diff("legacy.rs", "old\n", "", FileAction::Delete, None)
            .unwrap()
            .patch;

        let set = patch_set(vec![
            patch("add b", modify),
            patch("add new module", create),
            patch("drop legacy", delete),
        ]);
        let gate = WriteGate::new(&host, &approvals, set.workflow_id.clone());
        let applied = PatchApplicator::new(gate).apply_patch_set(&set).unwrap();

        assert_eq!(applied.commits.len(), 3);
        assert_eq!(applied.pull.number, 1);
        assert!(applied.branch.starts_with("patchflow/"));
        assert_eq!(
            host.files.borrow().get("src/new.rs").unwrap().content,
            "pub fn c() {}\n"
        );
        assert!(!host.files.borrow().contains_key("legacy.rs"));
        assert_eq!(
            host.files.borrow().get("src/lib.rs").unwrap().content,
            "fn a() {}\nfn b() {}\n"
        );
    }

    #[test]
    fn drifted_file_aborts_with_partial_commits() {
        let host = FakeHost::default()
            .with_file("a.txt", "one\n")
            .with_file("b.txt", "DRIFTED\n");
        let approvals = FixedApprovals(1);

        let patch_a =
            generate_unified_diff("a.txt", "one\n", "uno\n", FileAction::Modify, None)
                .unwrap()
                .patch;
        let patch_b =
            generate_unified_diff("b.txt", "two\n", "dos\n", FileAction::Modify, None)
                .unwrap()
                .patch;

        let set = patch_set(vec![patch("a", patch_a), patch("b", patch_b)]);
        let gate = WriteGate::new(&host, &approvals, set.workflow_id.clone());
        let failure = PatchApplicator::new(gate)
            .apply_patch_set(&set)
            .unwrap_err();

        assert_eq!(failure.commits.len(), 1);
        assert!(failure.branch.is_some());
        assert!(matches!(
            failure.error,
            PipelineError::Diff(DiffError::ContextMismatch { .. })
        ));
        // The PR is never opened on a failed set.
        assert!(host.pulls.borrow().is_empty());
    }

    #[test]
    fn unapproved_apply_is_blocked_before_any_remote_write() {
        let host = FakeHost::default().with_file("a.txt", "one\n");
        let approvals = FixedApprovals(0);

        let diff = generate_unified_diff("a.txt", "one\n", "uno\n", FileAction::Modify, None)
            .unwrap()
            .patch;
        let set = patch_set(vec![patch("a", diff)]);
        let gate = WriteGate::new(&host, &approvals, set.workflow_id.clone());
        let failure = PatchApplicator::new(gate)
            .apply_patch_set(&set)
            .unwrap_err();

        assert!(failure.is_no_approval());
        assert!(failure.commits.is_empty());
        assert_eq!(host.total_write_calls(), 0);
    }

    #[test]
    fn branch_only_variant_skips_the_pr() {
        let host = FakeHost::default().with_file("a.txt", "one\n");
        let approvals = FixedApprovals(1);

        let diff = generate_unified_diff("a.txt", "one\n", "uno\n", FileAction::Modify, None)
            .unwrap()
            .patch;
        let set = patch_set(vec![patch("a", diff)]);
        let gate = WriteGate::new(&host, &approvals, set.workflow_id.clone());
        let application = PatchApplicator::new(gate).apply_to_branch(&set).unwrap();

        assert_eq!(application.commits.len(), 1);
        assert!(host.pulls.borrow().is_empty());
    }
}
