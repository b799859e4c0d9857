use crate::util::{
    decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, id_err, sql_err, to_rfc3339,
};
use pf_core::error::StorageError;
use pf_core::types::enums::{Stage, StageStatus, WorkflowState};
use pf_core::types::ids::WorkflowId;
use pf_core::types::workflow::Workflow;
use pf_core::workflows::WorkflowRepository;
use chrono::Utc;
use rusqlite::Connection;

const COLUMNS: &str = "id, goal, feedback, repos_json, state, stage, stage_status, created_at, updated_at";

pub struct WorkflowRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> WorkflowRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl WorkflowRepository for WorkflowRepo<'_> {
    fn create(&self, workflow: Workflow) -> Result<Workflow, StorageError> {
        let sql = "INSERT INTO workflows (id, goal, feedback, repos_json, state, stage, stage_status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
        let params = (
            workflow.id.as_str(),
            workflow.goal.clone(),
            workflow.feedback.clone(),
            encode_json(&workflow.repos)?,
            encode_enum(&workflow.state)?,
            workflow
                .stage
                .map(|stage| encode_enum(&stage))
                .transpose()?,
            workflow
                .stage_status
                .map(|status| encode_enum(&status))
                .transpose()?,
            to_rfc3339(&workflow.created_at),
            to_rfc3339(&workflow.updated_at),
        );
        self.conn.execute(sql, params).map_err(sql_err)?;
        Ok(workflow)
    }

    fn get(&self, id: &WorkflowId) -> Result<Option<Workflow>, StorageError> {
        let sql = format!("SELECT {COLUMNS} FROM workflows WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(sql_err)?;
        let mut rows = stmt.query([id.as_str()]).map_err(sql_err)?;
        let Some(row) = rows.next().map_err(sql_err)? else {
            return Ok(None);
        };
        map_workflow_row(row).map(Some)
    }

    fn set_state(
        &self,
        id: &WorkflowId,
        state: WorkflowState,
        stage: Option<(Stage, StageStatus)>,
    ) -> Result<Workflow, StorageError> {
        let sql = "UPDATE workflows SET state = ?2, stage = ?3, stage_status = ?4, updated_at = ?5 WHERE id = ?1";
        let params = (
            id.as_str(),
            encode_enum(&state)?,
            stage.map(|(stage, _)| encode_enum(&stage)).transpose()?,
            stage.map(|(_, status)| encode_enum(&status)).transpose()?,
            to_rfc3339(&Utc::now()),
        );
        let changed = self.conn.execute(sql, params).map_err(sql_err)?;
        if changed == 0 {
            return Err(StorageError::NotFound);
        }
        self.get(id)?.ok_or(StorageError::NotFound)
    }

    fn set_feedback(&self, id: &WorkflowId, feedback: &str) -> Result<Workflow, StorageError> {
        let sql = "UPDATE workflows SET feedback = ?2, updated_at = ?3 WHERE id = ?1";
        let changed = self
            .conn
            .execute(sql, (id.as_str(), feedback, to_rfc3339(&Utc::now())))
            .map_err(sql_err)?;
        if changed == 0 {
            return Err(StorageError::NotFound);
        }
        self.get(id)?.ok_or(StorageError::NotFound)
    }

    fn find_by_base_sha(&self, sha: &str) -> Result<Vec<Workflow>, StorageError> {
        let sql = format!("SELECT {COLUMNS} FROM workflows ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql).map_err(sql_err)?;
        let mut rows = stmt.query([]).map_err(sql_err)?;
        let mut workflows = Vec::new();
        while let Some(row) = rows.next().map_err(sql_err)? {
            let workflow = map_workflow_row(row)?;
            if workflow.repos.iter().any(|repo| repo.base_sha == sha) {
                workflows.push(workflow);
            }
        }
        Ok(workflows)
    }
}

fn map_workflow_row(row: &rusqlite::Row<'_>) -> Result<Workflow, StorageError> {
    let id: String = row.get(0).map_err(sql_err)?;
    let goal: String = row.get(1).map_err(sql_err)?;
    let feedback: Option<String> = row.get(2).map_err(sql_err)?;
    let repos_json: String = row.get(3).map_err(sql_err)?;
    let state: String = row.get(4).map_err(sql_err)?;
    let stage: Option<String> = row.get(5).map_err(sql_err)?;
    let stage_status: Option<String> = row.get(6).map_err(sql_err)?;
    let created_at: String = row.get(7).map_err(sql_err)?;
    let updated_at: String = row.get(8).map_err(sql_err)?;

    Ok(Workflow {
        id: WorkflowId::new(id).map_err(id_err)?,
        goal,
        feedback,
        repos: decode_json(&repos_json)?,
        state: decode_enum(&state)?,
        stage: stage.as_deref().map(decode_enum).transpose()?,
        stage_status: stage_status.as_deref().map(decode_enum).transpose()?,
        created_at: from_rfc3339(&created_at)?,
        updated_at: from_rfc3339(&updated_at)?,
    })
}
