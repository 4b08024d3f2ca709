//! Workflow storage.
//!
//! Durable storage sits behind the [`StorageGateway`] trait so the
//! engine can run against the bundled in-memory backend or a real
//! database without code changes. The [`WorkflowStore`] facade layers
//! the active working set (per-entity locks for workflows still being
//! advanced) on top of whichever gateway is plugged in.

mod memory;

pub use memory::{InMemoryGateway, WorkflowStore};

use async_trait::async_trait;

use crate::error::Result;
use crate::workflow::{Workflow, WorkflowId, WorkflowState, WorkflowType};

/// Durable backend for workflow records.
///
/// Implementations must be safe to call concurrently; the store issues
/// overlapping persists from the monitor and foreground updates.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Write the full workflow record, replacing any previous version.
    async fn persist(&self, workflow: &Workflow) -> Result<()>;

    /// Fetch a workflow by id, or `None` if the backend has no record.
    async fn fetch(&self, id: WorkflowId) -> Result<Option<Workflow>>;

    /// List workflows matching the filter.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Workflow>>;
}

/// Criteria for listing workflows. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub state: Option<WorkflowState>,
    pub workflow_type: Option<WorkflowType>,
    pub creator_id: Option<String>,
    pub limit: Option<usize>,
}

impl ListFilter {
    /// Check whether a workflow satisfies every set criterion.
    ///
    /// `limit` is not checked here; it caps the result set and is
    /// applied by whoever assembles the final list.
    pub fn matches(&self, workflow: &Workflow) -> bool {
        if let Some(state) = self.state {
            if workflow.state != state {
                return false;
            }
        }
        if let Some(workflow_type) = self.workflow_type {
            if workflow.workflow_type != workflow_type {
                return false;
            }
        }
        if let Some(creator_id) = &self.creator_id {
            if &workflow.creator_id != creator_id {
                return false;
            }
        }
        true
    }
}
