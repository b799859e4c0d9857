use crate::util::{
    decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, id_err, sql_err, to_rfc3339,
};
use pf_core::error::StorageError;
use pf_core::pulls::PullRepository;
use pf_core::types::enums::PullStatus;
use pf_core::types::ids::{PullId, WorkflowId};
use pf_core::types::pull::PullRequestRecord;
use chrono::Utc;
use rusqlite::Connection;

const COLUMNS: &str =
    "id, workflow_id, repo_json, number, url, branch, head_sha, status, created_at, updated_at";

pub struct PullRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> PullRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_many(&self, sql: &str, param: &str) -> Result<Vec<PullRequestRecord>, StorageError> {
        let mut stmt = self.conn.prepare(sql).map_err(sql_err)?;
        let mut rows = stmt.query([param]).map_err(sql_err)?;
        let mut pulls = Vec::new();
        while let Some(row) = rows.next().map_err(sql_err)? {
            pulls.push(map_pull_row(row)?);
        }
        Ok(pulls)
    }
}

impl PullRepository for PullRepo<'_> {
    fn record(&self, pull: PullRequestRecord) -> Result<PullRequestRecord, StorageError> {
        let sql = "INSERT INTO pulls (id, workflow_id, repo_json, number, url, branch, head_sha, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";
        let params = (
            pull.id.as_str(),
            pull.workflow_id.as_str(),
            encode_json(&pull.repo)?,
            i64::try_from(pull.number).unwrap_or(i64::MAX),
            pull.url.clone(),
            pull.branch.clone(),
            pull.head_sha.clone(),
            encode_enum(&pull.status)?,
            to_rfc3339(&pull.created_at),
            to_rfc3339(&pull.updated_at),
        );
        self.conn.execute(sql, params).map_err(sql_err)?;
        Ok(pull)
    }

    fn list_for_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Vec<PullRequestRecord>, StorageError> {
        let sql = format!("SELECT {COLUMNS} FROM pulls WHERE workflow_id = ?1 ORDER BY id ASC");
        self.query_many(&sql, workflow_id.as_str())
    }

    fn find_by_head_sha(&self, sha: &str) -> Result<Option<PullRequestRecord>, StorageError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM pulls WHERE head_sha = ?1 AND status = 'Open' ORDER BY id ASC"
        );
        Ok(self.query_many(&sql, sha)?.into_iter().next())
    }

    fn set_status(
        &self,
        id: &PullId,
        status: PullStatus,
    ) -> Result<PullRequestRecord, StorageError> {
        let sql = "UPDATE pulls SET status = ?2, updated_at = ?3 WHERE id = ?1";
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
        let sql = format!("SELECT {COLUMNS} FROM pulls WHERE id = ?1");
        self.query_many(&sql, id.as_str())?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound)
    }
}

fn map_pull_row(row: &rusqlite::Row<'_>) -> Result<PullRequestRecord, StorageError> {
    let id: String = row.get(0).map_err(sql_err)?;
    let workflow_id: String = row.get(1).map_err(sql_err)?;
    let repo_json: String = row.get(2).map_err(sql_err)?;
    let number: i64 = row.get(3).map_err(sql_err)?;
    let url: String = row.get(4).map_err(sql_err)?;
    let branch: String = row.get(5).map_err(sql_err)?;
    let head_sha: Option<String> = row.get(6).map_err(sql_err)?;
    let status: String = row.get(7).map_err(sql_err)?;
    let created_at: String = row.get(8).map_err(sql_err)?;
    let updated_at: String = row.get(9).map_err(sql_err)?;

    Ok(PullRequestRecord {
        id: PullId::new(id).map_err(id_err)?,
        workflow_id: WorkflowId::new(workflow_id).map_err(id_err)?,
        repo: decode_json(&repo_json)?,
        number: u64::try_from(number).unwrap_or(0),
        url,
        branch,
        head_sha,
        status: decode_enum(&status)?,
        created_at: from_rfc3339(&created_at)?,
        updated_at: from_rfc3339(&updated_at)?,
    })
}
