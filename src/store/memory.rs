//! In-memory storage backend and the active working set facade.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::store::{ListFilter, StorageGateway};
use crate::workflow::{Workflow, WorkflowId};
use crate::{cflog_debug, cflog_warn};

/// Gateway backed by a process-local map. The default backend and the
/// one every test runs against.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    records: RwLock<HashMap<WorkflowId, Workflow>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl StorageGateway for InMemoryGateway {
    async fn persist(&self, workflow: &Workflow) -> Result<()> {
        self.records
            .write()
            .await
            .insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn fetch(&self, id: WorkflowId) -> Result<Option<Workflow>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Workflow>> {
        let records = self.records.read().await;
        let mut out: Vec<Workflow> = records
            .values()
            .filter(|w| filter.matches(w))
            .cloned()
            .collect();
        // Stable order for callers and tests
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }
}

/// Facade over the active working set and the durable gateway.
///
/// Non-terminal workflows live in the active map behind per-entity
/// locks so the monitor and foreground updates contend per workflow,
/// not globally. Every mutation is written through to the gateway; a
/// failed write keeps the in-memory copy authoritative and surfaces
/// the error, so the caller can retry the persist without redoing the
/// mutation.
pub struct WorkflowStore {
    active: RwLock<HashMap<WorkflowId, Arc<RwLock<Workflow>>>>,
    gateway: Arc<dyn StorageGateway>,
}

impl WorkflowStore {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            gateway,
        }
    }

    /// Register a freshly created workflow in the active set and
    /// persist it.
    ///
    /// On persist failure the workflow stays registered in memory and
    /// the error is returned; the caller decides whether to surface it.
    pub async fn insert_active(&self, workflow: Workflow) -> Result<Arc<RwLock<Workflow>>> {
        let handle = self.admit(workflow).await;
        {
            let mut w = handle.write().await;
            self.write_through(&mut w).await?;
        }
        Ok(handle)
    }

    /// Register a workflow in the active set without persisting, e.g.
    /// when re-admitting a durable record after a restart. If the id is
    /// already active the existing handle is returned.
    pub async fn admit(&self, workflow: Workflow) -> Arc<RwLock<Workflow>> {
        let id = workflow.id;
        let mut active = self.active.write().await;
        Arc::clone(
            active
                .entry(id)
                .or_insert_with(|| Arc::new(RwLock::new(workflow))),
        )
    }

    /// Get the lock handle for an active workflow.
    pub async fn get_active(&self, id: WorkflowId) -> Option<Arc<RwLock<Workflow>>> {
        self.active.read().await.get(&id).cloned()
    }

    /// Read a workflow: active copy first, then the gateway.
    pub async fn get(&self, id: WorkflowId) -> Result<Option<Workflow>> {
        if let Some(handle) = self.get_active(id).await {
            return Ok(Some(handle.read().await.clone()));
        }
        self.gateway.fetch(id).await
    }

    /// IDs of all workflows currently in the active set.
    pub async fn active_ids(&self) -> Vec<WorkflowId> {
        self.active.read().await.keys().copied().collect()
    }

    /// Clone of every active workflow at this instant.
    pub async fn active_snapshot(&self) -> Vec<Workflow> {
        let handles: Vec<Arc<RwLock<Workflow>>> =
            self.active.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.read().await.clone());
        }
        out
    }

    /// Drop a workflow from the active set. The durable record stays.
    pub async fn remove_active(&self, id: WorkflowId) {
        if self.active.write().await.remove(&id).is_some() {
            cflog_debug!("store: evicted workflow {} from active set", id.short());
        }
    }

    /// Stamp `updated_at` and write the workflow through to the
    /// gateway. Callers hold the entity's write lock across this call
    /// so the persisted record matches what they mutated.
    ///
    /// # Errors
    /// Returns the gateway's error when the write fails. The in-memory
    /// copy keeps the mutation either way, so the persist is retryable.
    pub async fn save(&self, workflow: &mut Workflow) -> Result<()> {
        self.write_through(workflow).await
    }

    /// List workflows matching the filter, merging the durable records
    /// with the (possibly fresher) active copies.
    pub async fn list(&self, filter: &ListFilter) -> Result<Vec<Workflow>> {
        let mut merged: HashMap<WorkflowId, Workflow> = self
            .gateway
            .list(&ListFilter {
                limit: None,
                ..filter.clone()
            })
            .await?
            .into_iter()
            .map(|w| (w.id, w))
            .collect();

        // Active copies override whatever the gateway returned; a write
        // that has not landed yet is still visible here.
        for workflow in self.active_snapshot().await {
            if filter.matches(&workflow) {
                merged.insert(workflow.id, workflow);
            } else {
                merged.remove(&workflow.id);
            }
        }

        let mut out: Vec<Workflow> = merged.into_values().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn write_through(&self, workflow: &mut Workflow) -> Result<()> {
        workflow.updated_at = Utc::now();
        if let Err(e) = self.gateway.persist(workflow).await {
            cflog_warn!(
                "store: persist failed for workflow {}, keeping in-memory copy: {}",
                workflow.id.short(),
                e
            );
            return Err(e);
        }
        Ok(())
    }
}
