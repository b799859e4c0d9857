use crate::util::{decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, sql_err, to_rfc3339};
use pf_core::audit::AuditRepository;
use pf_core::error::StorageError;
use pf_events::types::EventRecord;
use rusqlite::Connection;
use ulid::Ulid;

pub struct EventRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> EventRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl AuditRepository for EventRepo<'_> {
    fn append(&self, mut event: EventRecord) -> Result<EventRecord, StorageError> {
        event.seq = next_seq(self.conn)?;
        event.id = format!("evt_{}", Ulid::new());
        let sql = "INSERT INTO events (id, seq, at, correlation_id, source, body_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
        let params = (
            event.id.clone(),
            event.seq,
            to_rfc3339(&event.at),
            event.correlation_id.clone(),
            encode_enum(&event.source)?,
            encode_json(&event.body)?,
        );
        self.conn.execute(sql, params).map_err(sql_err)?;
        Ok(event)
    }

    fn list(
        &self,
        after: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<EventRecord>, StorageError> {
        let mut sql =
            String::from("SELECT id, seq, at, correlation_id, source, body_json FROM events");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(after) = after {
            sql.push_str(" WHERE seq > ?");
            params.push(Box::new(after));
        }
        sql.push_str(" ORDER BY seq ASC");
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql).map_err(sql_err)?;
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params))
            .map_err(sql_err)?;
        let mut events = Vec::new();
        while let Some(row) = rows.next().map_err(sql_err)? {
            events.push(map_event_row(row)?);
        }
        Ok(events)
    }
}

fn map_event_row(row: &rusqlite::Row<'_>) -> Result<EventRecord, StorageError> {
    let id: String = row.get(0).map_err(sql_err)?;
    let seq: i64 = row.get(1).map_err(sql_err)?;
    let at: String = row.get(2).map_err(sql_err)?;
    let correlation_id: Option<String> = row.get(3).map_err(sql_err)?;
    let source: String = row.get(4).map_err(sql_err)?;
    let body_json: String = row.get(5).map_err(sql_err)?;

    Ok(EventRecord {
        id,
        seq,
        at: from_rfc3339(&at)?,
        correlation_id,
        source: decode_enum(&source)?,
        body: decode_json(&body_json)?,
    })
}

fn next_seq(conn: &Connection) -> Result<i64, StorageError> {
    let mut stmt = conn
        .prepare("SELECT COALESCE(MAX(seq), 0) FROM events")
        .map_err(sql_err)?;
    let seq: i64 = stmt.query_row([], |row| row.get(0)).map_err(sql_err)?;
    Ok(seq + 1)
}
