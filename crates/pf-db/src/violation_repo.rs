use crate::util::{decode_enum, encode_enum, from_rfc3339, id_err, sql_err, to_rfc3339};
use pf_core::error::StorageError;
use pf_core::types::ids::{PatchSetId, ViolationId};
use pf_core::types::policy::PolicyViolation;
use pf_core::violations::ViolationRepository;
use rusqlite::Connection;

pub struct ViolationRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ViolationRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ViolationRepository for ViolationRepo<'_> {
    fn record(&self, violation: PolicyViolation) -> Result<PolicyViolation, StorageError> {
        let sql = "INSERT INTO violations (id, patch_set_id, rule, severity, file, message, line, evidence, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
        let params = (
            violation.id.as_str(),
            violation.patch_set_id.as_str(),
            violation.rule.clone(),
            encode_enum(&violation.severity)?,
            violation.file.clone(),
            violation.message.clone(),
            violation.line,
            violation.evidence.clone(),
            to_rfc3339(&violation.created_at),
        );
        self.conn.execute(sql, params).map_err(sql_err)?;
        Ok(violation)
    }

    fn list_for_patch_set(
        &self,
        patch_set_id: &PatchSetId,
    ) -> Result<Vec<PolicyViolation>, StorageError> {
        let sql = "SELECT id, patch_set_id, rule, severity, file, message, line, evidence, created_at FROM violations WHERE patch_set_id = ?1 ORDER BY id ASC";
        let mut stmt = self.conn.prepare(sql).map_err(sql_err)?;
        let mut rows = stmt.query([patch_set_id.as_str()]).map_err(sql_err)?;
        let mut violations = Vec::new();
        while let Some(row) = rows.next().map_err(sql_err)? {
            let id: String = row.get(0).map_err(sql_err)?;
            let patch_set_id: String = row.get(1).map_err(sql_err)?;
            let rule: String = row.get(2).map_err(sql_err)?;
            let severity: String = row.get(3).map_err(sql_err)?;
            let file: String = row.get(4).map_err(sql_err)?;
            let message: String = row.get(5).map_err(sql_err)?;
            let line: Option<u32> = row.get(6).map_err(sql_err)?;
            let evidence: Option<String> = row.get(7).map_err(sql_err)?;
            let created_at: String = row.get(8).map_err(sql_err)?;
            violations.push(PolicyViolation {
                id: ViolationId::new(id).map_err(id_err)?,
                patch_set_id: PatchSetId::new(patch_set_id).map_err(id_err)?,
                rule,
                severity: decode_enum(&severity)?,
                file,
                message,
                line,
                evidence,
                created_at: from_rfc3339(&created_at)?,
            });
        }
        Ok(violations)
    }
}
