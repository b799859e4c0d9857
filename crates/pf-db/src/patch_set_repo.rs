use crate::util::{
    decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, id_err, sql_err, to_rfc3339,
};
use pf_core::error::StorageError;
use pf_core::patch_sets::PatchSetRepository;
use pf_core::types::enums::{PatchSetStatus, PolicyVerdict};
use pf_core::types::ids::{PatchSetId, WorkflowId};
use pf_core::types::patch::PatchSet;
use chrono::Utc;
use rusqlite::Connection;

const COLUMNS: &str = "id, workflow_id, repo_json, title, base_sha, status, policy_verdict, patches_json, created_at, updated_at";

pub struct PatchSetRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> PatchSetRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_one(&self, id: &PatchSetId) -> Result<Option<PatchSet>, StorageError> {
        let sql = format!("SELECT {COLUMNS} FROM patch_sets WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(sql_err)?;
        let mut rows = stmt.query([id.as_str()]).map_err(sql_err)?;
        let Some(row) = rows.next().map_err(sql_err)? else {
            return Ok(None);
        };
        map_patch_set_row(row).map(Some)
    }

    fn query_many(&self, sql: &str, param: &str) -> Result<Vec<PatchSet>, StorageError> {
        let mut stmt = self.conn.prepare(sql).map_err(sql_err)?;
        let mut rows = stmt.query([param]).map_err(sql_err)?;
        let mut sets = Vec::new();
        while let Some(row) = rows.next().map_err(sql_err)? {
            sets.push(map_patch_set_row(row)?);
        }
        Ok(sets)
    }
}

impl PatchSetRepository for PatchSetRepo<'_> {
    fn create(&self, patch_set: PatchSet) -> Result<PatchSet, StorageError> {
        let sql = "INSERT INTO patch_sets (id, workflow_id, repo_json, title, base_sha, status, policy_verdict, patches_json, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";
        let params = (
            patch_set.id.as_str(),
            patch_set.workflow_id.as_str(),
            encode_json(&patch_set.repo)?,
            patch_set.title.clone(),
            patch_set.base_sha.clone(),
            encode_enum(&patch_set.status)?,
            patch_set
                .policy_verdict
                .map(|verdict| encode_enum(&verdict))
                .transpose()?,
            encode_json(&patch_set.patches)?,
            to_rfc3339(&patch_set.created_at),
            to_rfc3339(&patch_set.updated_at),
        );
        self.conn.execute(sql, params).map_err(sql_err)?;
        Ok(patch_set)
    }

    fn get(&self, id: &PatchSetId) -> Result<Option<PatchSet>, StorageError> {
        self.query_one(id)
    }

    fn list_for_workflow(&self, workflow_id: &WorkflowId) -> Result<Vec<PatchSet>, StorageError> {
        let sql =
            format!("SELECT {COLUMNS} FROM patch_sets WHERE workflow_id = ?1 ORDER BY id ASC");
        self.query_many(&sql, workflow_id.as_str())
    }

    fn set_status(
        &self,
        id: &PatchSetId,
        status: PatchSetStatus,
    ) -> Result<PatchSet, StorageError> {
        let sql = "UPDATE patch_sets SET status = ?2, updated_at = ?3 WHERE id = ?1";
        let changed = self
            .conn
            .execute(
                sql,
                (id.as_str(), encode_enum(&status)?, to_rfc3339(&Utc::now())),
            )
            .map_err(sql_err)?;
        if changed == 0 {
            return Err(StorageError::NotFound);
        }
        self.query_one(id)?.ok_or(StorageError::NotFound)
    }

    fn set_policy_verdict(
        &self,
        id: &PatchSetId,
        verdict: PolicyVerdict,
    ) -> Result<PatchSet, StorageError> {
        let sql = "UPDATE patch_sets SET policy_verdict = ?2, updated_at = ?3 WHERE id = ?1";
        let changed = self
            .conn
            .execute(
                sql,
                (id.as_str(), encode_enum(&verdict)?, to_rfc3339(&Utc::now())),
            )
            .map_err(sql_err)?;
        if changed == 0 {
            return Err(StorageError::NotFound);
        }
        self.query_one(id)?.ok_or(StorageError::NotFound)
    }

    fn find_by_base_sha(&self, sha: &str) -> Result<Vec<PatchSet>, StorageError> {
        let sql = format!("SELECT {COLUMNS} FROM patch_sets WHERE base_sha = ?1 ORDER BY id ASC");
        self.query_many(&sql, sha)
    }
}

fn map_patch_set_row(row: &rusqlite::Row<'_>) -> Result<PatchSet, StorageError> {
    let id: String = row.get(0).map_err(sql_err)?;
    let workflow_id: String = row.get(1).map_err(sql_err)?;
    let repo_json: String = row.get(2).map_err(sql_err)?;
    let title: String = row.get(3).map_err(sql_err)?;
    let base_sha: String = row.get(4).map_err(sql_err)?;
    let status: String = row.get(5).map_err(sql_err)?;
    let policy_verdict: Option<String> = row.get(6).map_err(sql_err)?;
    let patches_json: String = row.get(7).map_err(sql_err)?;
    let created_at: String = row.get(8).map_err(sql_err)?;
    let updated_at: String = row.get(9).map_err(sql_err)?;

    Ok(PatchSet {
        id: PatchSetId::new(id).map_err(id_err)?,
        workflow_id: WorkflowId::new(workflow_id).map_err(id_err)?,
        repo: decode_json(&repo_json)?,
        title,
        base_sha,
        status: decode_enum(&status)?,
        policy_verdict: policy_verdict.as_deref().map(decode_enum).transpose()?,
        patches: decode_json(&patches_json)?,
        created_at: from_rfc3339(&created_at)?,
        updated_at: from_rfc3339(&updated_at)?,
    })
}
