//! Background timeout and retry monitoring.
//!
//! A single monitor task sweeps the active working set on a fixed
//! interval. Each sweep checks every active workflow for an overall
//! timeout (force-failed with a recorded reason), a stage timeout
//! (retried in place while the stage has retries left, failed after),
//! and otherwise recomputes the derived state against the current
//! dependency picture. Terminal workflows are evicted from the active
//! set at the end of the sweep.
//!
//! `sweep_once` is public and takes an explicit `now` so the whole
//! policy can be driven deterministically from tests without sleeping.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dependency::DependencyResolver;
use crate::error::{Error, Result};
use crate::store::WorkflowStore;
use crate::workflow::{self, Workflow, WorkflowId, WorkflowState};
use crate::{cflog, cflog_debug, cflog_error, cflog_warn};

/// Reason recorded on a workflow force-failed by the overall timeout.
pub const WORKFLOW_TIMEOUT_BLOCKER: &str = "workflow timeout";

/// Lifecycle of the background monitor task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    NotStarted,
    Running,
    Stopped,
    /// The sweep task panicked. `ensure_running` will start a fresh one.
    Crashed,
}

/// Counters from one sweep, mainly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub checked: usize,
    pub timed_out_workflows: usize,
    pub retried_stages: usize,
    pub failed_stages: usize,
    pub evicted: usize,
    pub errors: usize,
}

/// Watches active workflows for timeouts and applies the retry policy.
pub struct TimeoutRetryMonitor {
    store: Arc<WorkflowStore>,
    resolver: DependencyResolver,
    interval: Duration,
    state: RwLock<MonitorState>,
    cancel: RwLock<CancellationToken>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimeoutRetryMonitor {
    pub fn new(store: Arc<WorkflowStore>, interval: Duration) -> Self {
        Self {
            store,
            resolver: DependencyResolver::new(),
            interval,
            state: RwLock::new(MonitorState::NotStarted),
            cancel: RwLock::new(CancellationToken::new()),
            handle: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        *self.state.read().unwrap()
    }

    /// Start the background sweep loop if it is not already running.
    ///
    /// Idempotent: calling while running is a no-op. After a stop or a
    /// crash a fresh task is started.
    ///
    /// # Errors
    /// Returns `MonitorStart` when called outside a tokio runtime.
    pub fn ensure_running(self: &Arc<Self>) -> Result<()> {
        {
            let state = self.state.read().unwrap();
            if *state == MonitorState::Running {
                return Ok(());
            }
        }

        tokio::runtime::Handle::try_current()
            .map_err(|e| Error::MonitorStart(e.to_string()))?;

        let mut state = self.state.write().unwrap();
        // Re-check under the write lock; another caller may have won
        if *state == MonitorState::Running {
            return Ok(());
        }

        let token = CancellationToken::new();
        *self.cancel.write().unwrap() = token.clone();

        // Clean up a stopped or crashed predecessor task
        if let Some(old) = self.handle.lock().unwrap().take() {
            old.abort();
        }

        let monitor = Arc::clone(self);
        let task = tokio::spawn(async move {
            monitor.run_loop(token).await;
        });
        *self.handle.lock().unwrap() = Some(task);
        *state = MonitorState::Running;
        cflog!("monitor: started, interval {:?}", self.interval);
        Ok(())
    }

    /// Signal the sweep loop to stop. Returns immediately; the task
    /// observes the cancellation at its next select point.
    pub fn stop(&self) {
        let mut state = self.state.write().unwrap();
        if *state != MonitorState::Running {
            return;
        }
        self.cancel.read().unwrap().cancel();
        *state = MonitorState::Stopped;
        cflog!("monitor: stop requested");
    }

    async fn run_loop(self: Arc<Self>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        // First tick fires immediately; skip it so creation is cheap
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    cflog_debug!("monitor: loop exiting on cancellation");
                    break;
                }
                _ = ticker.tick() => {
                    let sweeper = Arc::clone(&self);
                    // Sweeps run in their own task so a panic in one
                    // surfaces as a join error instead of killing the
                    // loop silently.
                    let outcome = tokio::spawn(async move {
                        sweeper.sweep_once(Utc::now()).await
                    })
                    .await;
                    match outcome {
                        Ok(stats) => {
                            if stats != SweepStats::default() {
                                cflog_debug!("monitor: sweep {:?}", stats);
                            }
                        }
                        Err(e) => {
                            cflog_error!("monitor: sweep task panicked: {}", e);
                            *self.state.write().unwrap() = MonitorState::Crashed;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Run one full sweep of the active set at the given instant.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> SweepStats {
        let mut stats = SweepStats::default();
        let ids = self.store.active_ids().await;
        let mut evict: Vec<WorkflowId> = Vec::new();

        for id in ids {
            stats.checked += 1;
            match self.sweep_workflow(id, now, &mut stats).await {
                Ok(terminal) => {
                    if terminal {
                        evict.push(id);
                    }
                }
                Err(e) => {
                    // One failing workflow never stops the sweep
                    stats.errors += 1;
                    cflog_warn!("monitor: sweep of workflow {} failed: {}", id.short(), e);
                }
            }
        }

        for id in evict {
            self.store.remove_active(id).await;
            stats.evicted += 1;
        }
        stats
    }

    /// Apply the timeout policy to a single workflow. Returns whether
    /// the workflow ended the check in a terminal state.
    async fn sweep_workflow(
        &self,
        id: WorkflowId,
        now: DateTime<Utc>,
        stats: &mut SweepStats,
    ) -> Result<bool> {
        let Some(handle) = self.store.get_active(id).await else {
            // Evicted between listing and locking; nothing to do
            return Ok(false);
        };

        // Dependency states are read before taking this workflow's
        // write lock; lock order is always blocker-then-target.
        let blockers = {
            let snapshot = handle.read().await.clone();
            if snapshot.is_terminal() {
                return Ok(true);
            }
            self.resolver
                .blockers_via_store(&self.store, &snapshot)
                .await?
        };

        let mut w = handle.write().await;
        if w.is_terminal() {
            return Ok(true);
        }

        if w.is_timed_out(now) {
            stats.timed_out_workflows += 1;
            fail_for_timeout(&mut w, blockers, now);
            cflog_warn!(
                "monitor: workflow {} exceeded its {}m budget, failed",
                w.id.short(),
                w.timeout_minutes
            );
            let saved = self.save_isolated(&mut w).await;
            return Ok(saved);
        }

        let before = (w.state, w.progress.blockers.clone());

        if let Some(stage) = w.current_stage_mut() {
            if stage.is_timed_out(now) {
                if stage.can_retry() {
                    stage.retry_count += 1;
                    stage.started_at = Some(now);
                    stats.retried_stages += 1;
                    cflog!(
                        "monitor: workflow {} stage '{}' timed out, retry {}/{}",
                        id.short(),
                        stage.name,
                        stage.retry_count,
                        stage.max_retries
                    );
                } else {
                    stage.state = WorkflowState::Failed;
                    stats.failed_stages += 1;
                    cflog_warn!(
                        "monitor: workflow {} stage '{}' out of retries, failed",
                        id.short(),
                        stage.name
                    );
                }
                workflow::recompute(&mut w, blockers, now);
                let saved = self.save_isolated(&mut w).await;
                return Ok(w.is_terminal() && saved);
            }
        }

        // No timeout fired; refresh against the dependency picture
        workflow::recompute(&mut w, blockers, now);
        let mut saved = true;
        if (w.state, w.progress.blockers.clone()) != before {
            saved = self.save_isolated(&mut w).await;
        }
        Ok(w.is_terminal() && saved)
    }

    /// Persist from the sweep loop. Unlike foreground operations the
    /// monitor has no caller to surface the error to, so a failed
    /// write is logged; the workflow stays in the active set and the
    /// next sweep retries it. Returns whether the write landed.
    async fn save_isolated(&self, w: &mut Workflow) -> bool {
        match self.store.save(w).await {
            Ok(()) => true,
            Err(e) => {
                cflog_warn!(
                    "monitor: persist of workflow {} failed, keeping in memory: {}",
                    w.id.short(),
                    e
                );
                false
            }
        }
    }
}

/// Force a non-terminal workflow to failed because its overall budget
/// ran out. The elapsed-time stamp lands here, on the transition into
/// the terminal state.
fn fail_for_timeout(w: &mut Workflow, mut blockers: Vec<String>, now: DateTime<Utc>) {
    w.refresh_time_spent(now);
    w.state = WorkflowState::Failed;
    blockers.push(WORKFLOW_TIMEOUT_BLOCKER.to_string());
    w.progress.blockers = blockers;
    w.refresh_progress();
}
