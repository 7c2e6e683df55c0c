//! Sessions that fail: panics, ledger outages and abandonment.

#![allow(clippy::arithmetic_side_effects)]

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;

use common::{
    FlakyStore, LateCheckEngine, PanicEngine, orchestrator, orchestrator_with, prompt, sid,
    wait_for_state,
};
use tollgate_approval::{ApprovalStatus, GATE_APPROVER, GateError, Verdict};
use tollgate_core::{Liveness, RunnerState};
use tollgate_runtime::{
    Orchestrator, PlanEngine, REAPER_APPROVER, RejectionPolicy, RuntimeError, TaskOutcome,
};

#[tokio::test]
async fn test_panicking_engine_fails_session() {
    let orch = orchestrator_with(Arc::new(PanicEngine));
    let s = sid("boom");
    orch.start(Some(s.clone()), json!({})).await.unwrap();
    wait_for_state(&orch, &s, RunnerState::Failed).await;

    let TaskOutcome::Failed { error, .. } = orch.result(&s).await.unwrap() else {
        panic!("expected failure");
    };
    assert_eq!(error, "computation panicked");
    assert_eq!(orch.liveness().liveness, Liveness::Idle);
}

#[tokio::test]
async fn test_ledger_outage_fails_session_without_suspending() {
    let store = Arc::new(FlakyStore::default());
    store.failing.store(true, Ordering::SeqCst);
    let orch = Orchestrator::builder(store.clone()).build().unwrap();

    let s = sid("offline");
    orch.start(Some(s.clone()), prompt("delete /etc/passwd"))
        .await
        .unwrap();
    wait_for_state(&orch, &s, RunnerState::Failed).await;

    let status = orch.status(&s).await.unwrap();
    assert_eq!(status.pending_request, None);
    assert!(orch.list_pending(None).await.unwrap().is_empty());
    assert!(matches!(
        orch.result(&s).await.unwrap(),
        TaskOutcome::Failed { .. }
    ));
}

#[tokio::test]
async fn test_ledger_outage_during_decision_keeps_session_suspended() {
    let store = Arc::new(FlakyStore::default());
    let orch = Orchestrator::builder(store.clone()).build().unwrap();
    let s = sid("flaky");
    orch.start(Some(s.clone()), prompt("delete x")).await.unwrap();
    wait_for_state(&orch, &s, RunnerState::SuspendedPendingApproval).await;
    let request = orch.list_pending(None).await.unwrap()[0].request_id;

    store.failing.store(true, Ordering::SeqCst);
    assert!(matches!(
        orch.approve(&s, request, json!({}), None, false)
            .await
            .unwrap_err(),
        RuntimeError::Ledger(_)
    ));
    assert_eq!(
        orch.status(&s).await.unwrap().state,
        RunnerState::SuspendedPendingApproval
    );

    store.failing.store(false, Ordering::SeqCst);
    orch.approve(&s, request, json!({}), None, false)
        .await
        .unwrap();
    orch.resume(&s).await.unwrap();
    wait_for_state(&orch, &s, RunnerState::Completed).await;
}

#[tokio::test]
async fn test_abort_policy_fails_on_rejection() {
    let orch = orchestrator_with(Arc::new(PlanEngine::new(RejectionPolicy::Abort)));
    let s = sid("strict");
    orch.start(Some(s.clone()), prompt("delete x then list"))
        .await
        .unwrap();
    wait_for_state(&orch, &s, RunnerState::SuspendedPendingApproval).await;

    let request = orch.list_pending(None).await.unwrap()[0].request_id;
    orch.reject(&s, request, "absolutely not", None)
        .await
        .unwrap();
    orch.resume(&s).await.unwrap();
    wait_for_state(&orch, &s, RunnerState::Failed).await;

    let TaskOutcome::Failed { error, .. } = orch.result(&s).await.unwrap() else {
        panic!("expected failure");
    };
    assert!(error.contains("absolutely not"), "{error}");
}

#[tokio::test]
async fn test_abandon_idle_fails_and_rejects() {
    let orch = orchestrator();
    let s = sid("stale");
    let fresh = sid("fresh");
    orch.start(Some(s.clone()), prompt("delete x")).await.unwrap();
    wait_for_state(&orch, &s, RunnerState::SuspendedPendingApproval).await;

    assert!(orch.abandon_idle(Duration::from_secs(3600)).await.is_empty());

    tokio::time::sleep(Duration::from_millis(300)).await;
    orch.start(Some(fresh.clone()), prompt("delete y"))
        .await
        .unwrap();
    wait_for_state(&orch, &fresh, RunnerState::SuspendedPendingApproval).await;

    // Only the older suspension crosses the threshold.
    let abandoned = orch.abandon_idle(Duration::from_millis(250)).await;
    assert_eq!(abandoned, vec![s.clone()]);
    assert_eq!(orch.status(&s).await.unwrap().state, RunnerState::Failed);
    assert_eq!(
        orch.status(&fresh).await.unwrap().state,
        RunnerState::SuspendedPendingApproval
    );

    let history = orch.ledger().list_session(&s).await.unwrap();
    assert_eq!(history[0].status, ApprovalStatus::Rejected);
    assert_eq!(history[0].approver.as_deref(), Some(REAPER_APPROVER));

    let TaskOutcome::Failed { error, .. } = orch.result(&s).await.unwrap() else {
        panic!("expected failure");
    };
    assert!(error.starts_with("abandoned"), "{error}");
    assert!(matches!(
        orch.resume(&s).await.unwrap_err(),
        RuntimeError::NotSuspended { .. }
    ));

    // The woken computation must not overwrite the abandonment.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(orch.status(&s).await.unwrap().state, RunnerState::Failed);
    assert_eq!(orch.liveness().counts.failed, 1);
}

#[tokio::test]
async fn test_check_after_completion_leaves_nothing_pending() {
    let (engine, report) = LateCheckEngine::new();
    let go = Arc::clone(&engine.go);
    let orch = orchestrator_with(Arc::new(engine));
    let s = sid("late");
    orch.start(Some(s.clone()), json!({})).await.unwrap();
    wait_for_state(&orch, &s, RunnerState::Completed).await;

    go.notify_one();
    let err = report.await.unwrap().unwrap_err();
    assert!(matches!(err, GateError::Abandoned { .. }), "{err}");

    assert!(orch.list_pending(None).await.unwrap().is_empty());
    let history = orch.ledger().list_session(&s).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ApprovalStatus::Rejected);
    assert_eq!(history[0].approver.as_deref(), Some(GATE_APPROVER));

    assert_eq!(orch.status(&s).await.unwrap().state, RunnerState::Completed);
    assert!(matches!(
        orch.resume(&s).await.unwrap_err(),
        RuntimeError::NotSuspended { .. }
    ));
}

#[tokio::test]
async fn test_abandon_idle_skips_decided_request() {
    let orch = orchestrator();
    let s = sid("decided");
    orch.start(Some(s.clone()), prompt("delete x")).await.unwrap();
    wait_for_state(&orch, &s, RunnerState::SuspendedPendingApproval).await;
    let request = orch.list_pending(None).await.unwrap()[0].request_id;

    orch.approve(&s, request, json!({}), None, false)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(orch.abandon_idle(Duration::from_millis(50)).await.is_empty());
    assert_eq!(
        orch.status(&s).await.unwrap().state,
        RunnerState::SuspendedPendingApproval
    );

    let receipt = orch.resume(&s).await.unwrap();
    assert_eq!(receipt.verdict, Verdict::Approved);
    wait_for_state(&orch, &s, RunnerState::Completed).await;
    assert_eq!(orch.liveness().counts.failed, 0);
}

#[tokio::test]
async fn test_abandon_idle_retries_when_rejection_cannot_be_written() {
    let store = Arc::new(FlakyStore::default());
    let orch = Orchestrator::builder(store.clone()).build().unwrap();
    let s = sid("stuck");
    orch.start(Some(s.clone()), prompt("delete x")).await.unwrap();
    wait_for_state(&orch, &s, RunnerState::SuspendedPendingApproval).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    store.failing.store(true, Ordering::SeqCst);
    assert!(orch.abandon_idle(Duration::from_millis(50)).await.is_empty());
    assert_eq!(
        orch.status(&s).await.unwrap().state,
        RunnerState::SuspendedPendingApproval
    );
    assert_eq!(orch.list_pending(Some(&s)).await.unwrap().len(), 1);

    store.failing.store(false, Ordering::SeqCst);
    assert_eq!(
        orch.abandon_idle(Duration::from_millis(50)).await,
        vec![s.clone()]
    );
    assert_eq!(orch.status(&s).await.unwrap().state, RunnerState::Failed);
    assert!(orch.list_pending(None).await.unwrap().is_empty());
    let history = orch.ledger().list_session(&s).await.unwrap();
    assert_eq!(history[0].status, ApprovalStatus::Rejected);
    assert_eq!(history[0].approver.as_deref(), Some(REAPER_APPROVER));
}

#[tokio::test]
async fn test_unknown_session_queries() {
    let orch = orchestrator();
    let ghost = sid("ghost");
    assert!(orch.status(&ghost).await.unwrap_err().is_not_found());
    assert!(orch.result(&ghost).await.unwrap_err().is_not_found());
    assert!(
        orch.reject(&ghost, tollgate_core::RequestId::new(), "x", None)
            .await
            .unwrap_err()
            .is_not_found()
    );
}
