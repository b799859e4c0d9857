use crate::error::StorageError;
use pf_events::types::EventRecord;

/// The system's only source of historical truth. Records are assigned their
/// id and sequence number on append and never mutated afterwards.
pub trait AuditRepository {
    fn append(&self, event: EventRecord) -> Result<EventRecord, StorageError>;
    fn list(&self, after: Option<i64>, limit: Option<u32>)
    -> Result<Vec<EventRecord>, StorageError>;
}
