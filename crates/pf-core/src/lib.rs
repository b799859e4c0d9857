pub mod applicator;
pub mod approvals;
pub mod audit;
pub mod ci;
pub mod diff;
pub mod error;
pub mod machine;
pub mod orchestrator;
pub mod patch_sets;
pub mod policy;
pub mod pulls;
pub mod store;
pub mod violations;
pub mod workflows;
pub mod write_gate;

pub mod types;

pub use crate::error::PipelineError;
pub use crate::orchestrator::{Orchestrator, RequestContext, TransitionOutcome};
pub use crate::store::Store;
