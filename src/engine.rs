//! The workflow engine: the crate's public operational surface.
//!
//! Wires the catalog, store, dependency resolver, monitor and report
//! generator together and exposes the operations callers actually use:
//! create, read, list, advance a stage, cancel, report, shut down.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::catalog::WorkflowCatalog;
use crate::config::Config;
use crate::dependency::DependencyResolver;
use crate::error::{Error, Result};
use crate::monitor::{MonitorState, TimeoutRetryMonitor};
use crate::report::{ReportGenerator, ReportRange, WorkflowReport};
use crate::store::{InMemoryGateway, ListFilter, StorageGateway, WorkflowStore};
use crate::workflow::{
    self, StageUpdate, Workflow, WorkflowDependency, WorkflowId, WorkflowPriority,
    WorkflowProgress, WorkflowStage, WorkflowState, WorkflowType,
};
use crate::{cflog, cflog_warn};

/// Everything needed to create a workflow.
#[derive(Debug, Clone)]
pub struct CreateWorkflowRequest {
    pub workflow_type: WorkflowType,
    pub title: String,
    pub description: String,
    pub creator_id: String,
    pub priority: WorkflowPriority,
    /// Workflows that must complete before this one may proceed.
    pub dependencies: Vec<WorkflowId>,
    pub metadata: Option<Value>,
}

impl CreateWorkflowRequest {
    pub fn new(workflow_type: WorkflowType, title: &str, creator_id: &str) -> Self {
        Self {
            workflow_type,
            title: title.to_string(),
            description: String::new(),
            creator_id: creator_id.to_string(),
            priority: WorkflowPriority::default(),
            dependencies: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_priority(mut self, priority: WorkflowPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<WorkflowId>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// Orchestrates workflows end to end.
pub struct WorkflowEngine {
    catalog: Arc<WorkflowCatalog>,
    store: Arc<WorkflowStore>,
    resolver: DependencyResolver,
    monitor: Arc<TimeoutRetryMonitor>,
    generator: ReportGenerator,
}

impl WorkflowEngine {
    /// Build an engine with the standard catalog and the in-memory
    /// backend.
    pub fn new(config: &Config) -> Self {
        Self::with_gateway(config, Arc::new(InMemoryGateway::new()))
    }

    /// Build an engine against a caller-supplied storage backend.
    pub fn with_gateway(config: &Config, gateway: Arc<dyn StorageGateway>) -> Self {
        crate::log::init(config.debug);
        let store = Arc::new(WorkflowStore::new(gateway));
        let monitor = Arc::new(TimeoutRetryMonitor::new(
            Arc::clone(&store),
            config.monitor_interval(),
        ));
        Self {
            catalog: Arc::new(WorkflowCatalog::standard()),
            store,
            resolver: DependencyResolver::new(),
            monitor,
            generator: ReportGenerator::new(),
        }
    }

    /// The store this engine operates on. Mainly for tests and for
    /// embedding callers that need raw access.
    pub fn store(&self) -> Arc<WorkflowStore> {
        Arc::clone(&self.store)
    }

    /// The background monitor.
    pub fn monitor(&self) -> Arc<TimeoutRetryMonitor> {
        Arc::clone(&self.monitor)
    }

    /// Create a workflow from its catalog definition.
    ///
    /// The definition's stages and overall timeout are copied onto the
    /// new entity; the listed dependencies become blocking edges. The
    /// workflow is persisted, registered in the active set, and the
    /// monitor is started if it is not running yet.
    ///
    /// # Errors
    /// Returns `UnknownWorkflowType` when the type has no catalog
    /// definition. A persist failure is surfaced as `Persistence`; the
    /// workflow is already registered in memory at that point, so the
    /// error is retryable without re-creating it.
    pub async fn create_workflow(&self, request: CreateWorkflowRequest) -> Result<Workflow> {
        let definition = self.catalog.definition_for(request.workflow_type)?;
        let now = Utc::now();

        let stages: Vec<WorkflowStage> = definition
            .stages
            .iter()
            .map(|t| WorkflowStage::new(&t.name, t.role, t.timeout_minutes))
            .collect();

        let dependencies: Vec<WorkflowDependency> = request
            .dependencies
            .iter()
            .map(|id| WorkflowDependency::blocks(*id))
            .collect();

        let mut created = Workflow {
            id: WorkflowId::new(),
            workflow_type: request.workflow_type,
            title: request.title,
            description: request.description,
            creator_id: request.creator_id,
            priority: request.priority,
            state: WorkflowState::Pending,
            stages,
            dependencies,
            progress: WorkflowProgress::default(),
            timeout_minutes: definition.timeout_minutes,
            created_at: now,
            updated_at: now,
            completed_at: None,
            artifacts: Value::Object(serde_json::Map::new()),
            metadata: request
                .metadata
                .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
        };

        // A workflow created with unmet dependencies starts blocked
        let blockers = self.resolver.blockers_via_store(&self.store, &created).await?;
        workflow::recompute(&mut created, blockers, now);

        cflog!(
            "engine: created {} workflow {} '{}' ({} stages)",
            created.workflow_type,
            created.id.short(),
            created.title,
            created.progress.total_stages
        );

        // Monitoring covers the new workflow even when its first
        // persist fails; the record lives in the active set either way
        let inserted = self.store.insert_active(created).await;
        self.ensure_monitoring();
        let handle = inserted?;
        let snapshot = handle.read().await.clone();
        Ok(snapshot)
    }

    /// Read a workflow by id.
    ///
    /// # Errors
    /// Returns `WorkflowNotFound` when neither the active set nor the
    /// backend has a record.
    pub async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow> {
        self.store
            .get(id)
            .await?
            .ok_or(Error::WorkflowNotFound(id))
    }

    /// List workflows matching the filter.
    pub async fn list_workflows(&self, filter: ListFilter) -> Result<Vec<Workflow>> {
        self.store.list(&filter).await
    }

    /// Apply an update to one stage of a workflow on behalf of
    /// `actor_id`, then recompute and persist the aggregate.
    ///
    /// The workflow is looked up in the active set first, then read
    /// through to the backend; a durable non-terminal record (e.g.
    /// after a restart) is re-admitted to the active set.
    ///
    /// # Errors
    /// Returns `WorkflowNotFound` when the id is in neither the active
    /// set nor the backend, `WorkflowTerminal` for a finished workflow,
    /// `InvalidStageIndex` for an out-of-range index, and `Persistence`
    /// when the write-through fails (the in-memory update stands and
    /// the persist is retryable).
    pub async fn update_stage(
        &self,
        id: WorkflowId,
        stage_index: usize,
        update: StageUpdate,
        actor_id: &str,
    ) -> Result<Workflow> {
        let handle = self.live_handle(id).await?;

        // Blockers are read before the target's write lock
        let blockers = {
            let snapshot = handle.read().await.clone();
            let len = snapshot.stages.len();
            if stage_index >= len {
                return Err(Error::InvalidStageIndex {
                    workflow: id,
                    index: stage_index,
                    len,
                });
            }
            self.resolver
                .blockers_via_store(&self.store, &snapshot)
                .await?
        };

        let now = Utc::now();
        let mut w = handle.write().await;
        if w.is_terminal() {
            return Err(Error::WorkflowTerminal { id, state: w.state });
        }
        // Stage list length never changes, so the index stays valid
        workflow::apply_stage_update(&mut w.stages[stage_index], &update, now);
        workflow::recompute(&mut w, blockers, now);
        cflog!(
            "engine: {} updated workflow {} stage {} '{}'",
            actor_id,
            id.short(),
            stage_index,
            w.stages[stage_index].name
        );
        self.store.save(&mut w).await?;

        if w.is_terminal() {
            let snapshot = w.clone();
            drop(w);
            self.store.remove_active(id).await;
            cflog!(
                "engine: workflow {} reached {} via stage update",
                id.short(),
                snapshot.state
            );
            return Ok(snapshot);
        }
        Ok(w.clone())
    }

    /// Lock handle for a workflow that may still be worked on. Reads
    /// through to the backend and re-admits non-terminal records.
    async fn live_handle(&self, id: WorkflowId) -> Result<Arc<tokio::sync::RwLock<Workflow>>> {
        if let Some(handle) = self.store.get_active(id).await {
            return Ok(handle);
        }
        let record = self
            .store
            .get(id)
            .await?
            .ok_or(Error::WorkflowNotFound(id))?;
        if record.is_terminal() {
            return Err(Error::WorkflowTerminal {
                id,
                state: record.state,
            });
        }
        cflog!("engine: re-admitted durable workflow {}", id.short());
        Ok(self.store.admit(record).await)
    }

    /// Cancel a workflow. Idempotent: cancelling an already terminal
    /// workflow returns it unchanged.
    ///
    /// # Errors
    /// Returns `WorkflowNotFound` for an unknown workflow and
    /// `Persistence` when the write-through fails (the in-memory
    /// cancellation stands and the persist is retryable).
    pub async fn cancel_workflow(&self, id: WorkflowId) -> Result<Workflow> {
        let handle = match self.live_handle(id).await {
            Ok(handle) => handle,
            // Already terminal: return the record unchanged
            Err(Error::WorkflowTerminal { .. }) => return self.get_workflow(id).await,
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        let snapshot = {
            let mut w = handle.write().await;
            if w.is_terminal() {
                return Ok(w.clone());
            }
            w.refresh_time_spent(now);
            w.state = WorkflowState::Cancelled;
            for stage in &mut w.stages {
                if !stage.is_terminal() {
                    stage.state = WorkflowState::Cancelled;
                }
            }
            w.refresh_progress();
            self.store.save(&mut w).await?;
            w.clone()
        };

        self.store.remove_active(id).await;
        cflog!("engine: cancelled workflow {}", id.short());
        Ok(snapshot)
    }

    /// Summarize all known workflows, optionally restricted to a
    /// creation-time range.
    pub async fn generate_report(&self, range: ReportRange) -> Result<WorkflowReport> {
        let workflows = self.store.list(&ListFilter::default()).await?;
        Ok(self.generator.summarize(&workflows, range))
    }

    /// Stop the background monitor. Workflow records are untouched.
    pub fn shutdown(&self) {
        if self.monitor.state() == MonitorState::Running {
            self.monitor.stop();
        }
        cflog!("engine: shut down");
    }

    /// Start the monitor, logging rather than failing: creation still
    /// succeeds when no runtime is available, the caller just gets no
    /// background sweeps.
    fn ensure_monitoring(&self) {
        if let Err(e) = self.monitor.ensure_running() {
            cflog_warn!("engine: monitor not started: {}", e);
        }
    }
}
