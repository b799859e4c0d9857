use crate::util::{decode_enum, encode_enum, from_rfc3339, id_err, sql_err, to_rfc3339};
use pf_core::approvals::ApprovalRepository;
use pf_core::error::StorageError;
use pf_core::types::approval::Approval;
use pf_core::types::enums::ApprovalKind;
use pf_core::types::ids::{ApprovalId, WorkflowId};
use rusqlite::Connection;

pub struct ApprovalRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ApprovalRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ApprovalRepository for ApprovalRepo<'_> {
    fn record(&self, approval: Approval) -> Result<Approval, StorageError> {
        let sql = "INSERT INTO approvals (id, workflow_id, kind, approved_by, note, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
        let params = (
            approval.id.as_str(),
            approval.workflow_id.as_str(),
            encode_enum(&approval.kind)?,
            approval.approved_by.clone(),
            approval.note.clone(),
            to_rfc3339(&approval.created_at),
        );
        self.conn.execute(sql, params).map_err(sql_err)?;
        Ok(approval)
    }

    fn count(&self, workflow_id: &WorkflowId, kind: ApprovalKind) -> Result<u64, StorageError> {
        let sql = "SELECT COUNT(*) FROM approvals WHERE workflow_id = ?1 AND kind = ?2";
        let mut stmt = self.conn.prepare(sql).map_err(sql_err)?;
        let count: i64 = stmt
            .query_row((workflow_id.as_str(), encode_enum(&kind)?), |row| {
                row.get(0)
            })
            .map_err(sql_err)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn list_for_workflow(&self, workflow_id: &WorkflowId) -> Result<Vec<Approval>, StorageError> {
        let sql = "SELECT id, workflow_id, kind, approved_by, note, created_at FROM approvals WHERE workflow_id = ?1 ORDER BY created_at ASC";
        let mut stmt = self.conn.prepare(sql).map_err(sql_err)?;
        let mut rows = stmt.query([workflow_id.as_str()]).map_err(sql_err)?;
        let mut approvals = Vec::new();
        while let Some(row) = rows.next().map_err(sql_err)? {
            let id: String = row.get(0).map_err(sql_err)?;
            let workflow_id: String = row.get(1).map_err(sql_err)?;
            let kind: String = row.get(2).map_err(sql_err)?;
            let approved_by: Option<String> = row.get(3).map_err(sql_err)?;
            let note: Option<String> = row.get(4).map_err(sql_err)?;
            let created_at: String = row.get(5).map_err(sql_err)?;
            approvals.push(Approval {
                id: ApprovalId::new(id).map_err(id_err)?,
                workflow_id: WorkflowId::new(workflow_id).map_err(id_err)?,
                kind: decode_enum(&kind)?,
                approved_by,
                note,
                created_at: from_rfc3339(&created_at)?,
            });
        }
        Ok(approvals)
    }
}
