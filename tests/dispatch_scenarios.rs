//! End-to-end dispatch behaviour of the orchestrator under paused time.

mod common;

use common::*;
use fanout_core::error::DispatchError;
use fanout_core::orchestration::{
    BatchOutcome, Orchestrator, OrchestratorConfig, OverallStatus, RetryPolicy,
};
use fanout_core::state_machine::BatchState;
use fanout_core::worker::{BatchWorker, ErrorKind, ReservedConcurrencyWorker};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(concurrency_cap: usize) -> Orchestrator {
    Orchestrator::new(OrchestratorConfig {
        concurrency_cap,
        ..OrchestratorConfig::default()
    })
    .unwrap()
}

fn assert_gaps(actual: &[Duration], expected_secs: &[u64]) {
    assert_eq!(actual.len(), expected_secs.len(), "gaps: {actual:?}");
    for (gap, secs) in actual.iter().zip(expected_secs) {
        let expected = Duration::from_secs(*secs);
        assert!(
            *gap >= expected && *gap < expected + Duration::from_millis(5),
            "expected a gap of {expected:?}, got {gap:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_two_retryable_failures_then_success() {
    let worker = Arc::new(ScriptedWorker::succeeding().script(
        0,
        [
            Step::Fail(ErrorKind::ServiceException),
            Step::Fail(ErrorKind::ThrottlingException),
            Step::Succeed(json!({ "pages": 3 })),
        ],
    ));

    let report = orchestrator(10)
        .execute(single_item_batches(1), worker.clone())
        .await;

    assert_eq!(report.status, OverallStatus::Succeeded);
    assert_eq!(
        report.batch(0),
        Some(&BatchOutcome::Succeeded {
            output: json!({ "pages": 3 }),
            attempts_used: 3,
        })
    );
    assert_gaps(&worker.gaps_for(0), &[2, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_retryable_failure_exhausts_after_six_attempts() {
    let worker = Arc::new(ScriptedWorker::failing(ErrorKind::ServiceException));

    let report = orchestrator(10)
        .execute(single_item_batches(1), worker.clone())
        .await;

    assert_eq!(report.status, OverallStatus::Failed);
    match report.batch(0).unwrap() {
        BatchOutcome::Failed {
            error,
            attempts_used,
        } => {
            assert_eq!(*attempts_used, 6);
            assert!(matches!(
                error,
                DispatchError::RetryExhausted {
                    kind: ErrorKind::ServiceException,
                    attempts: 6,
                    ..
                }
            ));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(worker.invocation_count(), 6);
    assert_gaps(&worker.gaps_for(0), &[2, 4, 8, 16, 32]);
    assert_eq!(report.stats.total_attempts, 6);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_failure_is_not_retried() {
    let worker = Arc::new(ScriptedWorker::failing(ErrorKind::AccessDenied));

    let report = orchestrator(10)
        .execute(single_item_batches(1), worker.clone())
        .await;

    let outcome = report.batch(0).unwrap();
    assert_eq!(outcome.attempts_used(), 1);
    assert!(matches!(
        outcome.error(),
        Some(DispatchError::NonRetryable {
            kind: ErrorKind::AccessDenied,
            attempt: 1,
            ..
        })
    ));
    assert_eq!(worker.invocation_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_does_not_cancel_siblings() {
    let worker = Arc::new(
        ScriptedWorker::succeeding()
            .script(1, [Step::Fail(ErrorKind::InvalidPayload)])
            .latency(Duration::from_millis(100)),
    );

    let report = orchestrator(2)
        .execute(single_item_batches(4), worker.clone())
        .await;

    assert_eq!(report.status, OverallStatus::PartiallyFailed);
    assert_eq!(report.succeeded_count(), 3);
    assert_eq!(report.unsuccessful_batches(), vec![1]);
    assert!(!report.timed_out);
}

#[tokio::test(start_paused = true)]
async fn test_every_batch_failing_is_overall_failure() {
    let worker = Arc::new(ScriptedWorker::failing(ErrorKind::InvalidPayload));

    let report = orchestrator(3).execute(single_item_batches(5), worker).await;

    assert_eq!(report.status, OverallStatus::Failed);
    assert_eq!(report.failed_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_running_batches_never_exceed_cap() {
    let worker = Arc::new(ScriptedWorker::succeeding().latency(Duration::from_secs(1)));

    let report = orchestrator(3)
        .execute(single_item_batches(20), worker.clone())
        .await;

    assert!(report.is_success());
    assert_eq!(worker.peak_running(), 3);
    assert_eq!(report.stats.peak_running, 3);
    assert_eq!(report.stats.concurrency_cap, 3);
}

#[tokio::test(start_paused = true)]
async fn test_retries_share_slots_with_fresh_batches() {
    let worker = Arc::new(
        ScriptedWorker::succeeding()
            .script(0, [Step::Fail(ErrorKind::ServiceException)])
            .latency(Duration::from_millis(500)),
    );

    let report = orchestrator(1)
        .execute(single_item_batches(3), worker.clone())
        .await;

    assert!(report.is_success());
    assert_eq!(report.batch(0).unwrap().attempts_used(), 2);
    assert_eq!(worker.peak_running(), 1);
    assert_eq!(report.stats.total_attempts, 4);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_returns_partial_report() {
    let worker = Arc::new(ScriptedWorker::succeeding().latency(Duration::from_secs(10)));
    let orchestrator = Orchestrator::new(OrchestratorConfig {
        concurrency_cap: 1,
        retry_policy: RetryPolicy::default(),
        deadline: Some(Duration::from_secs(15)),
    })
    .unwrap();

    let report = orchestrator
        .execute_named("deadline", single_item_batches(3), worker.clone())
        .await;

    assert!(report.timed_out);
    assert_eq!(report.status, OverallStatus::PartiallyFailed);
    assert!(report.batch(0).unwrap().is_succeeded());
    assert!(matches!(
        report.batch(1),
        Some(BatchOutcome::InProgress {
            state: BatchState::Running,
            attempts_used: 1,
            ..
        })
    ));
    assert!(matches!(
        report.batch(2),
        Some(BatchOutcome::InProgress {
            state: BatchState::Pending,
            attempts_used: 0,
            ..
        })
    ));

    // Nothing new is admitted once the deadline has passed.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(worker.invocation_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_not_reached_is_not_timed_out() {
    let worker = Arc::new(ScriptedWorker::succeeding().latency(Duration::from_secs(1)));
    let orchestrator = Orchestrator::new(OrchestratorConfig {
        concurrency_cap: 2,
        retry_policy: RetryPolicy::default(),
        deadline: Some(Duration::from_secs(60)),
    })
    .unwrap();

    let report = orchestrator.execute(single_item_batches(4), worker).await;

    assert!(!report.timed_out);
    assert!(report.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_reserved_concurrency_throttling_is_retried() {
    let reserved = Arc::new(ReservedConcurrencyWorker::new(
        ScriptedWorker::succeeding().latency(Duration::from_secs(1)),
        2,
    ));
    let orchestrator = Orchestrator::new(OrchestratorConfig {
        concurrency_cap: 4,
        retry_policy: RetryPolicy::new(Duration::from_millis(100), 2.0, 6).unwrap(),
        deadline: None,
    })
    .unwrap();

    let worker: Arc<dyn BatchWorker> = reserved.clone();
    let report = orchestrator.execute(single_item_batches(4), worker).await;

    assert!(report.is_success());
    assert!(reserved.throttled_count() >= 2);
    assert!(report.batches.values().any(|o| o.attempts_used() > 1));
    assert_eq!(reserved.inner().peak_running(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_restricted_retryable_set_fails_unlisted_kinds_immediately() {
    let policy = RetryPolicy::default().with_retryable_errors([ErrorKind::ThrottlingException]);
    let worker = Arc::new(ScriptedWorker::failing(ErrorKind::ServiceException));
    let orchestrator = Orchestrator::new(OrchestratorConfig {
        concurrency_cap: 1,
        retry_policy: policy,
        deadline: None,
    })
    .unwrap();

    let report = orchestrator.execute(single_item_batches(1), worker.clone()).await;

    assert_eq!(report.batch(0).unwrap().attempts_used(), 1);
    assert_eq!(worker.invocation_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_huge_backoff_leaves_batch_waiting_at_deadline() {
    let worker = Arc::new(ScriptedWorker::failing(ErrorKind::ServiceException));
    let orchestrator = Orchestrator::new(OrchestratorConfig {
        concurrency_cap: 1,
        retry_policy: RetryPolicy::new(Duration::from_secs(u64::MAX / 2), 2.0, 3).unwrap(),
        deadline: Some(Duration::from_secs(10)),
    })
    .unwrap();

    let report = orchestrator
        .execute(single_item_batches(1), worker.clone())
        .await;

    assert!(report.timed_out);
    assert_eq!(report.status, OverallStatus::Failed);
    match report.batch(0).unwrap() {
        BatchOutcome::InProgress {
            state,
            attempts_used,
            last_error,
        } => {
            assert_eq!(*state, BatchState::RetryWaiting);
            assert_eq!(*attempts_used, 1);
            assert!(matches!(
                last_error,
                Some(DispatchError::Retryable {
                    kind: ErrorKind::ServiceException,
                    attempt: 1,
                    ..
                })
            ));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(worker.invocation_count(), 1);
}
