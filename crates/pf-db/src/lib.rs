pub mod approval_repo;
pub mod event_repo;
pub mod patch_set_repo;
pub mod pull_repo;
pub mod schema;
pub mod store;
pub mod util;
pub mod violation_repo;
pub mod workflow_repo;

pub use crate::store::DbStore;
