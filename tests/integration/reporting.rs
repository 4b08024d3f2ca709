//! Reporting over mixed workflow populations.

use chrono::{Duration, Utc};

use crewflow::workflow::WorkflowState;
use crewflow::{ReportRange, StageUpdate};

use crate::fixtures::{bug_fix, complete_all_stages, engine};

#[tokio::test]
async fn empty_engine_reports_zeroes() {
    let engine = engine();
    let report = engine.generate_report(ReportRange::default()).await.unwrap();
    assert_eq!(report.total_workflows, 0);
    assert_eq!(report.completed_workflows, 0);
    assert_eq!(report.completion_rate, 0.0);
    assert_eq!(report.average_completion_hours, 0.0);
    engine.shutdown();
}

#[tokio::test]
async fn report_counts_mixed_states() {
    let engine = engine();

    let done = engine.create_workflow(bug_fix("done")).await.unwrap();
    complete_all_stages(&engine, done.id).await;

    let failed = engine.create_workflow(bug_fix("failed")).await.unwrap();
    engine
        .update_stage(
            failed.id,
            0,
            StageUpdate::state(WorkflowState::Failed),
            "alice",
        )
        .await
        .unwrap();

    let active = engine.create_workflow(bug_fix("active")).await.unwrap();
    engine
        .update_stage(
            active.id,
            0,
            StageUpdate::state(WorkflowState::InProgress),
            "alice",
        )
        .await
        .unwrap();

    let upstream = engine.create_workflow(bug_fix("upstream")).await.unwrap();
    let _blocked = engine
        .create_workflow(bug_fix("blocked").with_dependencies(vec![upstream.id]))
        .await
        .unwrap();

    let report = engine.generate_report(ReportRange::default()).await.unwrap();
    assert_eq!(report.total_workflows, 5);
    assert_eq!(report.completed_workflows, 1);
    assert_eq!(report.failed_workflows, 1);
    assert_eq!(report.active_workflows, 1);
    assert_eq!(report.blocked_workflows, 1);
    assert!((report.completion_rate - 0.2).abs() < f64::EPSILON);
    // Completed seconds after creation: rounds to ~zero hours
    assert!(report.average_completion_hours < 0.1);
    engine.shutdown();
}

#[tokio::test]
async fn report_range_excludes_out_of_window_workflows() {
    let engine = engine();
    let w = engine.create_workflow(bug_fix("t")).await.unwrap();
    complete_all_stages(&engine, w.id).await;

    // Window ending before the workflow was created
    let past_only = ReportRange {
        from: None,
        to: Some(w.created_at - Duration::seconds(1)),
    };
    let report = engine.generate_report(past_only).await.unwrap();
    assert_eq!(report.total_workflows, 0);

    // Window around creation sees it
    let around = ReportRange {
        from: Some(w.created_at - Duration::minutes(1)),
        to: Some(Utc::now() + Duration::minutes(1)),
    };
    let report = engine.generate_report(around).await.unwrap();
    assert_eq!(report.total_workflows, 1);
    assert_eq!(report.completed_workflows, 1);
    engine.shutdown();
}

#[tokio::test]
async fn report_includes_evicted_terminal_workflows() {
    let engine = engine();
    let w = engine.create_workflow(bug_fix("t")).await.unwrap();
    complete_all_stages(&engine, w.id).await;
    assert!(engine.store().get_active(w.id).await.is_none());

    // Out of the active set but still counted
    let report = engine.generate_report(ReportRange::default()).await.unwrap();
    assert_eq!(report.total_workflows, 1);
    assert_eq!(report.completed_workflows, 1);
    engine.shutdown();
}
