//! Timeout and retry behavior, driven through `sweep_once` with a
//! synthetic clock.

use chrono::{Duration, Utc};

use crewflow::monitor::WORKFLOW_TIMEOUT_BLOCKER;
use crewflow::workflow::WorkflowState;
use crewflow::{MonitorState, StageUpdate};

use crate::fixtures::{bug_fix, engine};

#[tokio::test]
async fn stage_timeout_retries_then_fails() {
    let engine = engine();
    let created = engine.create_workflow(bug_fix("t")).await.unwrap();
    let started = engine
        .update_stage(
            created.id,
            0,
            StageUpdate::state(WorkflowState::InProgress),
            "alice",
        )
        .await
        .unwrap();
    let max_retries = started.stages[0].max_retries;
    let stage_budget = Duration::minutes(started.stages[0].timeout_minutes + 1);
    let monitor = engine.monitor();

    // Each sweep past the stage budget burns one retry and restarts
    // the stage clock at the sweep instant.
    let mut now = started.stages[0].started_at.unwrap();
    for attempt in 1..=max_retries {
        now += stage_budget;
        let stats = monitor.sweep_once(now).await;
        assert_eq!(stats.retried_stages, 1, "retry {attempt}");

        let w = engine.get_workflow(created.id).await.unwrap();
        assert_eq!(w.stages[0].retry_count, attempt);
        assert_eq!(w.stages[0].state, WorkflowState::InProgress);
        assert_eq!(w.stages[0].started_at, Some(now));
        assert_eq!(w.state, WorkflowState::InProgress);
    }

    // Retries exhausted: the next timeout fails stage and workflow
    now += stage_budget;
    let stats = monitor.sweep_once(now).await;
    assert_eq!(stats.failed_stages, 1);
    assert_eq!(stats.evicted, 1);

    let w = engine.get_workflow(created.id).await.unwrap();
    assert_eq!(w.stages[0].state, WorkflowState::Failed);
    assert_eq!(w.stages[0].retry_count, max_retries);
    assert_eq!(w.state, WorkflowState::Failed);
    assert!(engine.store().get_active(created.id).await.is_none());
    engine.shutdown();
}

#[tokio::test]
async fn workflow_timeout_fails_with_recorded_reason() {
    let engine = engine();
    let created = engine.create_workflow(bug_fix("t")).await.unwrap();

    let past_budget = Utc::now() + Duration::minutes(created.timeout_minutes + 1);
    let stats = engine.monitor().sweep_once(past_budget).await;
    assert_eq!(stats.timed_out_workflows, 1);
    assert_eq!(stats.evicted, 1);

    let w = engine.get_workflow(created.id).await.unwrap();
    assert_eq!(w.state, WorkflowState::Failed);
    assert!(w
        .progress
        .blockers
        .contains(&WORKFLOW_TIMEOUT_BLOCKER.to_string()));
    // Counters still hold on the force-failed record
    assert_eq!(w.progress.total_stages, w.stages.len());
    assert_eq!(w.progress.completed_stages, 0);
    engine.shutdown();
}

#[tokio::test]
async fn terminal_state_is_monotonic_across_sweeps() {
    let engine = engine();
    let created = engine.create_workflow(bug_fix("t")).await.unwrap();

    let past_budget = Utc::now() + Duration::minutes(created.timeout_minutes + 1);
    engine.monitor().sweep_once(past_budget).await;
    let failed = engine.get_workflow(created.id).await.unwrap();
    assert_eq!(failed.state, WorkflowState::Failed);
    let frozen = failed.progress.time_spent_secs;

    // Sweeping far later changes nothing
    engine
        .monitor()
        .sweep_once(past_budget + Duration::days(7))
        .await;
    let later = engine.get_workflow(created.id).await.unwrap();
    assert_eq!(later.state, WorkflowState::Failed);
    assert_eq!(later.progress.time_spent_secs, frozen);
    engine.shutdown();
}

#[tokio::test]
async fn sweep_handles_each_workflow_independently() {
    let engine = engine();
    // A doomed 4-hour workflow next to a healthy 12-hour one
    let doomed = engine.create_workflow(bug_fix("doomed")).await.unwrap();
    let healthy = engine
        .create_workflow(crewflow::CreateWorkflowRequest::new(
            crewflow::WorkflowType::FeatureDevelopment,
            "healthy",
            "alice",
        ))
        .await
        .unwrap();

    let now = Utc::now() + Duration::minutes(doomed.timeout_minutes + 1);
    let stats = engine.monitor().sweep_once(now).await;
    assert_eq!(stats.checked, 2);
    assert_eq!(stats.timed_out_workflows, 1);
    assert_eq!(stats.evicted, 1);

    assert_eq!(
        engine.get_workflow(doomed.id).await.unwrap().state,
        WorkflowState::Failed
    );
    let healthy_after = engine.get_workflow(healthy.id).await.unwrap();
    assert_eq!(healthy_after.state, WorkflowState::Pending);
    assert!(engine.store().get_active(healthy.id).await.is_some());
    engine.shutdown();
}

#[tokio::test]
async fn monitor_lifecycle_states() {
    let engine = engine();
    let monitor = engine.monitor();

    // create_workflow starts the monitor
    assert_eq!(monitor.state(), MonitorState::NotStarted);
    engine.create_workflow(bug_fix("t")).await.unwrap();
    assert_eq!(monitor.state(), MonitorState::Running);

    // Creating more workflows leaves the running monitor alone
    engine.create_workflow(bug_fix("u")).await.unwrap();
    assert_eq!(monitor.state(), MonitorState::Running);

    engine.shutdown();
    assert_eq!(monitor.state(), MonitorState::Stopped);

    // A later creation restarts it
    engine.create_workflow(bug_fix("v")).await.unwrap();
    assert_eq!(monitor.state(), MonitorState::Running);
    engine.shutdown();
}

#[tokio::test]
async fn blocked_workflow_does_not_hit_stage_timeouts() {
    let engine = engine();
    let upstream = engine.create_workflow(bug_fix("upstream")).await.unwrap();
    let downstream = engine
        .create_workflow(bug_fix("downstream").with_dependencies(vec![upstream.id]))
        .await
        .unwrap();
    assert_eq!(downstream.state, WorkflowState::Blocked);

    // All of downstream's stages are pending, so a sweep within the
    // overall budget leaves it blocked, with counters refreshed.
    let stats = engine
        .monitor()
        .sweep_once(Utc::now() + Duration::minutes(5))
        .await;
    assert_eq!(stats.retried_stages, 0);
    assert_eq!(stats.failed_stages, 0);

    let w = engine.get_workflow(downstream.id).await.unwrap();
    assert_eq!(w.state, WorkflowState::Blocked);
    assert_eq!(w.progress.total_stages, 4);
    engine.shutdown();
}
