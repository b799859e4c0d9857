use pf_core::error::{PipelineError, StorageError};
use pf_core::store::Store;
use rusqlite::Connection;

use crate::approval_repo::ApprovalRepo;
use crate::event_repo::EventRepo;
use crate::patch_set_repo::PatchSetRepo;
use crate::pull_repo::PullRepo;
use crate::violation_repo::ViolationRepo;
use crate::workflow_repo::WorkflowRepo;

pub struct DbStore {
    conn: Connection,
}

impl DbStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn tx_err(err: rusqlite::Error) -> PipelineError {
    PipelineError::Storage(StorageError::Backend {
        message: err.to_string(),
    })
}

impl Store for DbStore {
    type Workflows<'a>
        = WorkflowRepo<'a>
    where
        Self: 'a;
    type PatchSets<'a>
        = PatchSetRepo<'a>
    where
        Self: 'a;
    type Approvals<'a>
        = ApprovalRepo<'a>
    where
        Self: 'a;
    type Violations<'a>
        = ViolationRepo<'a>
    where
        Self: 'a;
    type Pulls<'a>
        = PullRepo<'a>
    where
        Self: 'a;
    type Audit<'a>
        = EventRepo<'a>
    where
        Self: 'a;

    fn workflows(&self) -> Self::Workflows<'_> {
        WorkflowRepo::new(&self.conn)
    }

    fn patch_sets(&self) -> Self::PatchSets<'_> {
        PatchSetRepo::new(&self.conn)
    }

    fn approvals(&self) -> Self::Approvals<'_> {
        ApprovalRepo::new(&self.conn)
    }

    fn violations(&self) -> Self::Violations<'_> {
        ViolationRepo::new(&self.conn)
    }

    fn pulls(&self) -> Self::Pulls<'_> {
        PullRepo::new(&self.conn)
    }

    fn audit(&self) -> Self::Audit<'_> {
        EventRepo::new(&self.conn)
    }

    fn with_tx<F, T>(&self, f: F) -> Result<T, PipelineError>
    where
        F: FnOnce(&Self) -> Result<T, PipelineError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE").map_err(tx_err)?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT").map_err(tx_err)?;
                Ok(value)
            }
            Err(err) => {
                self.conn.execute_batch("ROLLBACK").map_err(tx_err)?;
                Err(err)
            }
        }
    }
}
