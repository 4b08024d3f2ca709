//! Pure state recomputation for workflows.
//!
//! `recompute` is invoked after every mutation (stage updates, monitor
//! actions) and derives the aggregate workflow state from dependency
//! blockers and stage states. The tie-break order matters and must not
//! be rearranged:
//!
//! 1. Terminal states are sticky (completed/failed/cancelled stay put).
//! 2. Dependency blocking dominates stage-derived state.
//! 3. All stages completed -> completed (completed_at stamped once).
//! 4. Any stage failed -> failed.
//! 5. Any stage in progress or reviewing -> in_progress.
//! 6. All stages pending -> pending.
//!
//! Stickiness of terminal states is load-bearing: after the monitor
//! force-fails a timed-out workflow whose stages are all still pending,
//! the mandated post-mutation recompute would otherwise derive `pending`
//! again and resurrect it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Workflow, WorkflowStage, WorkflowState};

/// An explicit, enumerated stage update.
///
/// Only the fields listed here can be written onto a stage from the
/// outside; there is no open-ended field map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageUpdate {
    /// New stage state, if the caller is transitioning the stage.
    pub state: Option<WorkflowState>,
    /// Replacement artifact payload produced by the stage's work.
    pub artifacts: Option<serde_json::Value>,
}

impl StageUpdate {
    /// Update that only transitions the stage state.
    pub fn state(state: WorkflowState) -> Self {
        Self {
            state: Some(state),
            artifacts: None,
        }
    }

    /// Update that only replaces the stage artifacts.
    pub fn artifacts(artifacts: serde_json::Value) -> Self {
        Self {
            state: None,
            artifacts: Some(artifacts),
        }
    }

    /// Attach an artifact payload to this update.
    pub fn with_artifacts(mut self, artifacts: serde_json::Value) -> Self {
        self.artifacts = Some(artifacts);
        self
    }
}

/// Apply a stage update in place, stamping timestamps at most once.
///
/// Entering `in_progress` stamps `started_at` if unset; entering
/// `completed` stamps `completed_at` if unset. Re-applying the same
/// target state never resets an existing timestamp.
pub fn apply_stage_update(stage: &mut WorkflowStage, update: &StageUpdate, now: DateTime<Utc>) {
    if let Some(state) = update.state {
        stage.state = state;
        if state == WorkflowState::InProgress && stage.started_at.is_none() {
            stage.started_at = Some(now);
        }
        if state == WorkflowState::Completed && stage.completed_at.is_none() {
            stage.completed_at = Some(now);
        }
    }
    if let Some(artifacts) = &update.artifacts {
        stage.artifacts = artifacts.clone();
    }
}

/// Recompute the aggregate state and derived progress of a workflow.
///
/// `blockers` is the resolver's current view of unresolved blocking
/// dependencies; a non-empty list forces `blocked` and skips the
/// stage-derived state entirely. Progress counters are refreshed on
/// every call so the count invariants hold even while blocked.
pub fn recompute(workflow: &mut Workflow, blockers: Vec<String>, now: DateTime<Utc>) {
    if workflow.is_terminal() {
        // Sticky: refresh counters only, time_spent stays frozen.
        workflow.refresh_progress();
        return;
    }

    if !blockers.is_empty() {
        workflow.state = WorkflowState::Blocked;
        workflow.progress.blockers = blockers;
        workflow.refresh_progress();
        workflow.refresh_time_spent(now);
        return;
    }

    workflow.progress.blockers.clear();

    let total = workflow.stages.len();
    let completed = workflow.count_stages_in(WorkflowState::Completed);
    let failed = workflow.count_stages_in(WorkflowState::Failed);
    let in_flight = workflow.count_stages_in(WorkflowState::InProgress)
        + workflow.count_stages_in(WorkflowState::Reviewing);
    let pending = workflow.count_stages_in(WorkflowState::Pending);

    if total > 0 && completed == total {
        workflow.state = WorkflowState::Completed;
        if workflow.completed_at.is_none() {
            workflow.completed_at = Some(now);
        }
    } else if failed > 0 {
        workflow.state = WorkflowState::Failed;
    } else if in_flight > 0 {
        workflow.state = WorkflowState::InProgress;
    } else if pending == total {
        workflow.state = WorkflowState::Pending;
    }

    workflow.refresh_progress();
    // Final stamp when entering a terminal state this call; frozen after.
    workflow.refresh_time_spent(now);
}
