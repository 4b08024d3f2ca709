//! Shared helpers for the integration suites.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crewflow::store::StorageGateway;
use crewflow::workflow::WorkflowState;
use crewflow::{
    Config, CreateWorkflowRequest, Error, ListFilter, Result, StageUpdate, Workflow,
    WorkflowEngine, WorkflowId, WorkflowType,
};

/// Engine with a short monitor interval. Tests drive sweeps manually,
/// so the interval only matters for the lifecycle tests.
pub fn engine() -> WorkflowEngine {
    let config = Config {
        monitor_interval_secs: 1,
        debug: false,
    };
    WorkflowEngine::new(&config)
}

pub fn bug_fix(title: &str) -> CreateWorkflowRequest {
    CreateWorkflowRequest::new(WorkflowType::BugFix, title, "alice")
}

/// Walk every stage of a workflow through in_progress then completed.
pub async fn complete_all_stages(engine: &WorkflowEngine, id: WorkflowId) -> Workflow {
    let workflow = engine.get_workflow(id).await.unwrap();
    let mut latest = workflow.clone();
    for index in 0..workflow.stages.len() {
        engine
            .update_stage(
                id,
                index,
                StageUpdate::state(WorkflowState::InProgress),
                "alice",
            )
            .await
            .unwrap();
        latest = engine
            .update_stage(
                id,
                index,
                StageUpdate::state(WorkflowState::Completed),
                "alice",
            )
            .await
            .unwrap();
    }
    latest
}

/// Gateway whose persists can be switched off, for exercising the
/// store's keep-in-memory behavior through the engine.
pub struct FlakyGateway {
    accepting: AtomicBool,
    inner: crewflow::InMemoryGateway,
}

impl FlakyGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            accepting: AtomicBool::new(true),
            inner: crewflow::InMemoryGateway::new(),
        })
    }

    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageGateway for FlakyGateway {
    async fn persist(&self, workflow: &Workflow) -> Result<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::Persistence("gateway offline".to_string()));
        }
        self.inner.persist(workflow).await
    }

    async fn fetch(&self, id: WorkflowId) -> Result<Option<Workflow>> {
        self.inner.fetch(id).await
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Workflow>> {
        self.inner.list(filter).await
    }
}
