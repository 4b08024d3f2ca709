//! Core workflow type definitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default number of in-place retries a stage gets before it is failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Unique identifier for a workflow instance.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    /// Create a new unique workflow identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state shared by workflows and their stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Created but no work has started yet.
    #[default]
    Pending,
    /// Work is actively in flight.
    InProgress,
    /// Output produced, awaiting review.
    Reviewing,
    /// Held up by unresolved dependencies.
    Blocked,
    /// Finished successfully (terminal).
    Completed,
    /// Finished unsuccessfully (terminal).
    Failed,
    /// Abandoned before completion (terminal).
    Cancelled,
}

impl WorkflowState {
    /// Check if this state is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Completed | WorkflowState::Failed | WorkflowState::Cancelled
        )
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowState::Pending => write!(f, "pending"),
            WorkflowState::InProgress => write!(f, "in_progress"),
            WorkflowState::Reviewing => write!(f, "reviewing"),
            WorkflowState::Blocked => write!(f, "blocked"),
            WorkflowState::Completed => write!(f, "completed"),
            WorkflowState::Failed => write!(f, "failed"),
            WorkflowState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Closed enumeration of workflow templates the platform knows about.
///
/// Every type maps to at most one catalog definition; creating a
/// workflow of a type with no registered definition is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    FeatureDevelopment,
    BugFix,
    CodeReview,
    DesignTask,
    Testing,
    Documentation,
    ArchitectureReview,
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowType::FeatureDevelopment => write!(f, "feature_development"),
            WorkflowType::BugFix => write!(f, "bug_fix"),
            WorkflowType::CodeReview => write!(f, "code_review"),
            WorkflowType::DesignTask => write!(f, "design_task"),
            WorkflowType::Testing => write!(f, "testing"),
            WorkflowType::Documentation => write!(f, "documentation"),
            WorkflowType::ArchitectureReview => write!(f, "architecture_review"),
        }
    }
}

/// Priority assigned by the workflow creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for WorkflowPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowPriority::Low => write!(f, "low"),
            WorkflowPriority::Medium => write!(f, "medium"),
            WorkflowPriority::High => write!(f, "high"),
            WorkflowPriority::Urgent => write!(f, "urgent"),
        }
    }
}

/// How one workflow relates to another.
///
/// Only `Blocks` and `Requires` affect scheduling; `RelatesTo` is
/// informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Blocks,
    Requires,
    RelatesTo,
}

impl DependencyType {
    /// Check if this dependency type gates the dependent workflow.
    pub fn is_blocking(&self) -> bool {
        matches!(self, DependencyType::Blocks | DependencyType::Requires)
    }
}

/// Role personas that stages are assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Cto,
    UxDesigner,
    UiDesigner,
    Developer,
    CodeReviewer,
    Tester,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Cto => write!(f, "cto"),
            Role::UxDesigner => write!(f, "ux_designer"),
            Role::UiDesigner => write!(f, "ui_designer"),
            Role::Developer => write!(f, "developer"),
            Role::CodeReviewer => write!(f, "code_reviewer"),
            Role::Tester => write!(f, "tester"),
        }
    }
}

/// A single stage of a workflow, owned exclusively by its parent.
///
/// Name, role and timeout are copied from the catalog definition at
/// creation time; the definition itself never mutates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStage {
    pub name: String,
    /// The persona responsible for this stage's work.
    pub role: Role,
    pub state: WorkflowState,
    /// Stamped the first time the stage enters `in_progress`.
    pub started_at: Option<DateTime<Utc>>,
    /// Stamped the first time the stage enters `completed`.
    pub completed_at: Option<DateTime<Utc>>,
    pub timeout_minutes: i64,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Opaque payload produced by the stage's work; not interpreted here.
    pub artifacts: serde_json::Value,
}

impl WorkflowStage {
    /// Create a fresh pending stage.
    pub fn new(name: &str, role: Role, timeout_minutes: i64) -> Self {
        Self {
            name: name.to_string(),
            role,
            state: WorkflowState::Pending,
            started_at: None,
            completed_at: None,
            timeout_minutes,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            artifacts: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Check if the stage is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Check if an in-progress stage has exceeded its timeout at `now`.
    ///
    /// Returns false when the stage is not in progress or was never
    /// started.
    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        if self.state != WorkflowState::InProgress {
            return false;
        }
        match self.started_at {
            Some(started) => now > started + Duration::minutes(self.timeout_minutes),
            None => false,
        }
    }

    /// Check if the stage still has retries left.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// A dependency edge from one workflow to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDependency {
    pub workflow_id: WorkflowId,
    pub dependency_type: DependencyType,
    pub created_at: DateTime<Utc>,
}

impl WorkflowDependency {
    /// Create a blocking dependency on another workflow.
    pub fn blocks(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id,
            dependency_type: DependencyType::Blocks,
            created_at: Utc::now(),
        }
    }
}

/// Derived progress, recomputed on every mutation and never set
/// independently.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowProgress {
    pub total_stages: usize,
    pub completed_stages: usize,
    /// Index of the first non-completed stage (last index if all done).
    pub current_stage_index: usize,
    /// completed / total, 0.0 when there are no stages.
    pub actual_progress: f64,
    /// Seconds since creation; frozen once the workflow is terminal.
    pub time_spent_secs: i64,
    /// Workflow IDs or textual reasons currently preventing progress.
    pub blockers: Vec<String>,
}

/// One workflow instance: an ordered sequence of role-assigned stages
/// advanced through a state machine.
///
/// The aggregate state and progress are derived; they are only written
/// by `workflow::recompute` (and by the monitor/cancel paths that force
/// a terminal state before recomputing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub workflow_type: WorkflowType,
    pub title: String,
    pub description: String,
    pub creator_id: String,
    pub priority: WorkflowPriority,
    pub state: WorkflowState,
    /// Fixed-length after creation; stages never grow or shrink.
    pub stages: Vec<WorkflowStage>,
    /// Fixed after creation.
    pub dependencies: Vec<WorkflowDependency>,
    pub progress: WorkflowProgress,
    /// Overall timeout, copied from the catalog definition at creation.
    pub timeout_minutes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stamped exactly once, on the first transition into `completed`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Opaque workflow-level outputs.
    pub artifacts: serde_json::Value,
    /// Opaque caller-supplied annotations.
    pub metadata: serde_json::Value,
}

impl Workflow {
    /// Check if the workflow is blocked by dependencies.
    pub fn is_blocked(&self) -> bool {
        self.state == WorkflowState::Blocked
    }

    /// Check if the workflow is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Check if the workflow can proceed to further stage work.
    pub fn can_proceed(&self) -> bool {
        !self.is_blocked() && !self.is_terminal()
    }

    /// Get the current stage, if any.
    pub fn current_stage(&self) -> Option<&WorkflowStage> {
        self.stages.get(self.progress.current_stage_index)
    }

    /// Mutable access to the current stage, if any.
    pub fn current_stage_mut(&mut self) -> Option<&mut WorkflowStage> {
        self.stages.get_mut(self.progress.current_stage_index)
    }

    /// Check if the whole workflow has exceeded its overall timeout.
    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        now > self.created_at + Duration::minutes(self.timeout_minutes)
    }

    /// Count stages currently in the given state.
    pub fn count_stages_in(&self, state: WorkflowState) -> usize {
        self.stages.iter().filter(|s| s.state == state).count()
    }

    /// Refresh the derived stage counters and current stage index.
    ///
    /// Holds the invariants `total_stages == stages.len()` and
    /// `completed_stages == count(completed)` after every mutation.
    pub fn refresh_progress(&mut self) {
        let total = self.stages.len();
        let completed = self.count_stages_in(WorkflowState::Completed);
        self.progress.total_stages = total;
        self.progress.completed_stages = completed;
        self.progress.actual_progress = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };
        self.progress.current_stage_index = self
            .stages
            .iter()
            .position(|s| s.state != WorkflowState::Completed)
            .unwrap_or(total.saturating_sub(1));
    }

    /// Refresh the elapsed-time counter. Callers must not invoke this
    /// once the workflow is terminal; time_spent is frozen there.
    pub fn refresh_time_spent(&mut self, now: DateTime<Utc>) {
        self.progress.time_spent_secs = (now - self.created_at).num_seconds().max(0);
    }
}
