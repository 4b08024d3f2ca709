//! Workflow data model and state machine for the crewflow engine.
//!
//! This module provides the aggregate `Workflow` entity, its stages and
//! derived progress, and the pure state recomputation that runs after
//! every mutation.

mod state;
mod types;

pub use state::{apply_stage_update, recompute, StageUpdate};
pub use types::{
    DependencyType, Role, Workflow, WorkflowDependency, WorkflowId, WorkflowPriority,
    WorkflowProgress, WorkflowStage, WorkflowState, WorkflowType, DEFAULT_MAX_RETRIES,
};
