//! Dependency resolution for workflows.
//!
//! A workflow's dependency list is fixed at creation. Resolution is a
//! pure read: given the dependent workflow and a way to look up the
//! current state of each referenced workflow, produce the list of
//! blocker descriptions. The caller decides what to do with them
//! (usually feed them into `workflow::recompute`).

use std::collections::HashMap;

use crate::error::Result;
use crate::store::WorkflowStore;
use crate::workflow::{Workflow, WorkflowId, WorkflowState};

/// Resolves which of a workflow's dependencies currently block it.
#[derive(Debug, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Collect blocker descriptions for `workflow`.
    ///
    /// `lookup` returns the current state of a referenced workflow, or
    /// `None` if no such workflow exists. A blocking dependency counts
    /// as a blocker unless its referent is `completed`; a dangling
    /// reference also counts, so a workflow never silently proceeds
    /// past a dependency that cannot be checked.
    pub fn blockers_for<F>(&self, workflow: &Workflow, lookup: F) -> Vec<String>
    where
        F: Fn(WorkflowId) -> Option<WorkflowState>,
    {
        let mut blockers = Vec::new();
        for dep in &workflow.dependencies {
            if !dep.dependency_type.is_blocking() {
                continue;
            }
            match lookup(dep.workflow_id) {
                Some(WorkflowState::Completed) => {}
                Some(_) => blockers.push(dep.workflow_id.to_string()),
                None => blockers.push(format!("missing dependency {}", dep.workflow_id)),
            }
        }
        blockers
    }

    /// Collect blocker descriptions for `workflow` against the store.
    ///
    /// Reads referenced workflows through the store (active copy first,
    /// durable record second) before the caller locks the dependent, so
    /// lock order is always blocker-then-target.
    pub async fn blockers_via_store(
        &self,
        store: &WorkflowStore,
        workflow: &Workflow,
    ) -> Result<Vec<String>> {
        let mut states: HashMap<WorkflowId, WorkflowState> = HashMap::new();
        for dep in &workflow.dependencies {
            if !dep.dependency_type.is_blocking() {
                continue;
            }
            if let Some(other) = store.get(dep.workflow_id).await? {
                states.insert(dep.workflow_id, other.state);
            }
        }
        Ok(self.blockers_for(workflow, |id| states.get(&id).copied()))
    }
}
