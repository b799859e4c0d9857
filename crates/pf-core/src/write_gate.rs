use crate::error::{StorageError, WriteError};
use crate::types::enums::ApprovalKind;
use crate::types::ids::WorkflowId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("not found: {path}")]
    NotFound { path: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("backend error: {message}")]
    Backend { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub content: String,
    pub sha: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub sha: String,
    pub is_tree: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRef {
    pub r#ref: String,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenFile {
    pub sha: String,
    pub commit_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedFile {
    pub commit_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedPull {
    pub url: String,
    pub number: u64,
}

/// Injected remote-repository capability. Read operations are safe to call
/// directly; every write must go through the `WriteGate`.
pub trait RepoHost {
    fn get_file_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        r#ref: &str,
    ) -> Result<RemoteFile, HostError>;
    fn get_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<BranchInfo, HostError>;
    fn get_tree(&self, owner: &str, repo: &str, r#ref: &str) -> Result<Vec<TreeEntry>, HostError>;

    fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        base_sha: &str,
    ) -> Result<CreatedRef, HostError>;
    #[allow(clippy::too_many_arguments)]
    fn update_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
        branch: &str,
    ) -> Result<WrittenFile, HostError>;
    fn delete_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        sha: &str,
        branch: &str,
    ) -> Result<DeletedFile, HostError>;
    #[allow(clippy::too_many_arguments)]
    fn open_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<OpenedPull, HostError>;
}

pub trait ApprovalLookup {
    fn count_approvals(
        &self,
        workflow_id: &WorkflowId,
        kind: ApprovalKind,
    ) -> Result<u64, StorageError>;
}

/// Authorization interceptor over a `RepoHost`. Holds no state beyond its
/// collaborators; every mutating call asserts a recorded approval first.
pub struct WriteGate<'a, H, A> {
    host: &'a H,
    approvals: &'a A,
    workflow_id: WorkflowId,
}

impl<'a, H: RepoHost, A: ApprovalLookup> WriteGate<'a, H, A> {
    pub fn new(host: &'a H, approvals: &'a A, workflow_id: WorkflowId) -> Self {
        Self {
            host,
            approvals,
            workflow_id,
        }
    }

    pub fn host(&self) -> &H {
        self.host
    }

    pub fn assert_approved(&self, kind: ApprovalKind) -> Result<(), WriteError> {
        let count = self
            .approvals
            .count_approvals(&self.workflow_id, kind)
            .map_err(|err| WriteError::Remote {
                message: err.to_string(),
            })?;
        if count == 0 {
            tracing::warn!(
                workflow_id = %self.workflow_id,
                kind = ?kind,
                "write blocked: no approval recorded"
            );
            return Err(WriteError::BlockedNoApproval {
                workflow_id: self.workflow_id.to_string(),
                kind: kind_label(kind).to_string(),
            });
        }
        Ok(())
    }

    pub fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        base_sha: &str,
    ) -> Result<CreatedRef, WriteError> {
        self.assert_approved(ApprovalKind::ApplyPatches)?;
        self.host
            .create_branch(owner, repo, branch, base_sha)
            .map_err(remote)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
        branch: &str,
    ) -> Result<WrittenFile, WriteError> {
        self.assert_approved(ApprovalKind::ApplyPatches)?;
        self.host
            .update_file(owner, repo, path, message, content, sha, branch)
            .map_err(remote)
    }

    pub fn delete_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        sha: &str,
        branch: &str,
    ) -> Result<DeletedFile, WriteError> {
        self.assert_approved(ApprovalKind::ApplyPatches)?;
        self.host
            .delete_file(owner, repo, path, message, sha, branch)
            .map_err(remote)
    }

    pub fn open_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<OpenedPull, WriteError> {
        self.assert_approved(ApprovalKind::ApplyPatches)?;
        self.host
            .open_pull_request(owner, repo, head, base, title, body)
            .map_err(remote)
    }
}

fn remote(err: HostError) -> WriteError {
    WriteError::Remote {
        message: err.to_string(),
    }
}

fn kind_label(kind: ApprovalKind) -> &'static str {
    match kind {
        ApprovalKind::ApplyPatches => "apply_patches",
        ApprovalKind::Merge => "merge",
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::error::StorageError;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeHost {
        pub files: RefCell<HashMap<String, RemoteFile>>,
        pub branches: RefCell<Vec<String>>,
        pub pulls: RefCell<Vec<(String, String)>>,
        pub write_calls: RefCell<u32>,
        pub fail_update_for: RefCell<Option<String>>,
        next_pull_number: RefCell<u64>,
    }

    impl FakeHost {
        pub fn with_file(self, path: &str, content: &str) -> Self {
            self.files.borrow_mut().insert(
                path.to_string(),
                RemoteFile {
                    content: content.to_string(),
                    sha: format!("sha-{path}"),
                    size: content.len() as u64,
                },
            );
            self
        }

        pub fn total_write_calls(&self) -> u32 {
            *self.write_calls.borrow()
        }
    }

    impl RepoHost for FakeHost {
        fn get_file_contents(
            &self,
            _owner: &str,
            _repo: &str,
            path: &str,
            _ref: &str,
        ) -> Result<RemoteFile, HostError> {
            self.files
                .borrow()
                .get(path)
                .cloned()
                .ok_or_else(|| HostError::NotFound {
                    path: path.to_string(),
                })
        }

        fn get_branch(
            &self,
            _owner: &str,
            _repo: &str,
            branch: &str,
        ) -> Result<BranchInfo, HostError> {
            Ok(BranchInfo {
                name: branch.to_string(),
                sha: "head-sha".to_string(),
            })
        }

        fn get_tree(
            &self,
            _owner: &str,
            _repo: &str,
            _ref: &str,
        ) -> Result<Vec<TreeEntry>, HostError> {
            Ok(self
                .files
                .borrow()
                .iter()
                .map(|(path, file)| TreeEntry {
                    path: path.clone(),
                    sha: file.sha.clone(),
                    is_tree: false,
                })
                .collect())
        }

        fn create_branch(
            &self,
            _owner: &str,
            _repo: &str,
            branch: &str,
            base_sha: &str,
        ) -> Result<CreatedRef, HostError> {
            *self.write_calls.borrow_mut() += 1;
            self.branches.borrow_mut().push(branch.to_string());
            Ok(CreatedRef {
                r#ref: format!("refs/heads/{branch}"),
                sha: base_sha.to_string(),
            })
        }

        fn update_file(
            &self,
            _owner: &str,
            _repo: &str,
            path: &str,
            _message: &str,
            content: &str,
            _sha: Option<&str>,
            _branch: &str,
        ) -> Result<WrittenFile, HostError> {
            *self.write_calls.borrow_mut() += 1;
            if self.fail_update_for.borrow().as_deref() == Some(path) {
                return Err(HostError::Backend {
                    message: format!("injected failure writing {path}"),
                });
            }
            let commit_sha = format!("commit-{path}-{}", self.write_calls.borrow());
            self.files.borrow_mut().insert(
                path.to_string(),
                RemoteFile {
                    content: content.to_string(),
                    sha: format!("sha-{path}-updated"),
                    size: content.len() as u64,
                },
            );
            Ok(WrittenFile {
                sha: format!("sha-{path}-updated"),
                commit_sha,
            })
        }

        fn delete_file(
            &self,
            _owner: &str,
            _repo: &str,
            path: &str,
            _message: &str,
            _sha: &str,
            _branch: &str,
        ) -> Result<DeletedFile, HostError> {
            *self.write_calls.borrow_mut() += 1;
            self.files.borrow_mut().remove(path);
            Ok(DeletedFile {
                commit_sha: format!("commit-delete-{path}"),
            })
        }

        fn open_pull_request(
            &self,
            owner: &str,
            repo: &str,
            head: &str,
            _base: &str,
            _title: &str,
            _body: &str,
        ) -> Result<OpenedPull, HostError> {
            *self.write_calls.borrow_mut() += 1;
            let number = {
                let mut next = self.next_pull_number.borrow_mut();
                *next += 1;
                *next
            };
            self.pulls
                .borrow_mut()
                .push((format!("{owner}/{repo}"), head.to_string()));
            Ok(OpenedPull {
                url: format!("https://example.test/{owner}/{repo}/pull/{number}"),
                number,
            })
        }
    }

    pub struct FixedApprovals(pub u64);

    impl ApprovalLookup for FixedApprovals {
        fn count_approvals(
            &self,
            _workflow_id: &WorkflowId,
            _kind: ApprovalKind,
        ) -> Result<u64, StorageError> {
            Ok(self.0)
        }
    }
}
