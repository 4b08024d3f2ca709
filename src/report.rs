//! Aggregate reporting over workflow records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::{Workflow, WorkflowState};

/// Optional time window for a report; bounds are inclusive and apply
/// to `created_at`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ReportRange {
    fn contains(&self, at: DateTime<Utc>) -> bool {
        if let Some(from) = self.from {
            if at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if at > to {
                return false;
            }
        }
        true
    }
}

/// Point-in-time summary of a set of workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub total_workflows: usize,
    pub completed_workflows: usize,
    pub failed_workflows: usize,
    /// Workflows currently in progress or reviewing.
    pub active_workflows: usize,
    pub blocked_workflows: usize,
    /// Mean wall-clock hours from creation to completion, over
    /// completed workflows with a completion timestamp. Zero when
    /// there are none.
    pub average_completion_hours: f64,
    /// completed / total, zero when the set is empty.
    pub completion_rate: f64,
    pub generated_at: DateTime<Utc>,
}

/// Produces summaries from workflow snapshots. Never mutates anything.
#[derive(Debug, Default)]
pub struct ReportGenerator;

impl ReportGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Summarize the given workflows, restricted to `range`.
    pub fn summarize(&self, workflows: &[Workflow], range: ReportRange) -> WorkflowReport {
        let in_range: Vec<&Workflow> = workflows
            .iter()
            .filter(|w| range.contains(w.created_at))
            .collect();

        let total = in_range.len();
        let mut completed = 0usize;
        let mut failed = 0usize;
        let mut active = 0usize;
        let mut blocked = 0usize;
        let mut completion_secs: Vec<i64> = Vec::new();

        for w in &in_range {
            match w.state {
                WorkflowState::Completed => {
                    completed += 1;
                    if let Some(done) = w.completed_at {
                        completion_secs.push((done - w.created_at).num_seconds().max(0));
                    }
                }
                WorkflowState::Failed => failed += 1,
                WorkflowState::InProgress | WorkflowState::Reviewing => active += 1,
                WorkflowState::Blocked => blocked += 1,
                WorkflowState::Pending | WorkflowState::Cancelled => {}
            }
        }

        let average_completion_hours = if completion_secs.is_empty() {
            0.0
        } else {
            let total_secs: i64 = completion_secs.iter().sum();
            total_secs as f64 / completion_secs.len() as f64 / 3600.0
        };

        let completion_rate = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };

        WorkflowReport {
            total_workflows: total,
            completed_workflows: completed,
            failed_workflows: failed,
            active_workflows: active,
            blocked_workflows: blocked,
            average_completion_hours,
            completion_rate,
            generated_at: Utc::now(),
        }
    }
}
