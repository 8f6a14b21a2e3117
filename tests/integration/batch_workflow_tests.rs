/*!
 * End-to-end tests for the submit, poll, persist flow against a
 * scripted pipeline backend
 */

use std::sync::Arc;
use std::time::Duration;

use dubtrack::api::mock::{MockPipelineApi, MockStep};
use dubtrack::job::JobStatus;
use dubtrack::tracking::{
    BatchPoller, BatchRequest, BatchSubmitter, DiffCache, PollEvent, SaveCoordinator, StopReason,
};

use crate::common;

const TICK: Duration = Duration::from_millis(5);
const WAIT: Duration = Duration::from_secs(5);

fn url_request(urls: &[&str]) -> BatchRequest {
    BatchRequest {
        urls: urls.iter().map(|url| url.to_string()).collect(),
        target_languages: vec!["fr".to_string()],
        ..BatchRequest::default()
    }
}

/// Collect events until the poller reports why it stopped
async fn drain_until_stopped(
    events: &mut tokio::sync::mpsc::Receiver<PollEvent>,
) -> (Vec<PollEvent>, StopReason) {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("event before the deadline")
            .expect("a stop event before the channel closes");
        if let PollEvent::Stopped { reason, .. } = &event {
            let reason = *reason;
            seen.push(event);
            return (seen, reason);
        }
        seen.push(event);
    }
}

/// Test the whole flow: a URL batch is submitted, polled to completion
/// and every outcome lands in history exactly once
#[tokio::test]
async fn test_workflow_submitAndPoll_shouldPersistEveryOutcomeOnce() {
    common::init_test_logging();

    let queued = common::status_of(vec![
        common::batch_item("v0", JobStatus::Queued, None),
        common::batch_item("v1", JobStatus::Queued, None),
        common::batch_item("v2", JobStatus::Queued, None),
    ]);
    let halfway = common::status_of(vec![
        common::batch_item("v0", JobStatus::Completed, Some(100.0)),
        common::batch_item("v1", JobStatus::Processing, Some(55.0)),
        common::batch_item("v2", JobStatus::Processing, Some(10.0)),
    ]);
    let mut failed = common::batch_item("v2", JobStatus::Failed, None);
    failed.error = Some("voice cloning failed".to_string());
    let settled = common::status_of(vec![
        common::batch_item("v0", JobStatus::Completed, Some(100.0)),
        common::batch_item("v1", JobStatus::Completed, Some(100.0)),
        failed,
    ]);

    let api = Arc::new(MockPipelineApi::with_script(
        "bulk-1",
        vec![
            MockStep::Status(queued),
            MockStep::Status(halfway),
            MockStep::Status(settled),
        ],
    ));

    let submitter = BatchSubmitter::new(Arc::clone(&api));
    let ctx = submitter
        .submit(url_request(&[
            "https://example.com/v/0",
            "https://example.com/v/1",
            "https://example.com/v/2",
        ]))
        .await
        .expect("submission accepted");
    assert_eq!(ctx.batch_id, "bulk-1");
    assert_eq!(ctx.total, 3);

    let (cache, store, _backend) = common::tracking_stack();
    let poller = BatchPoller::with_timing(Arc::clone(&api), cache, TICK, 5);
    let mut events = poller.start(ctx.clone());

    let (seen, reason) = drain_until_stopped(&mut events).await;
    assert_eq!(reason, StopReason::Complete);

    // One snapshot per scripted round
    let snapshots = seen
        .iter()
        .filter(|event| matches!(event, PollEvent::Snapshot { .. }))
        .count();
    assert_eq!(snapshots, 3);
    assert_eq!(api.status_calls(), 3);

    // Newest first: v1 and v2 settled on the last round, v0 one round earlier
    let records = store.load();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].source_ref, "https://example.com/v/2");
    assert_eq!(records[0].status, JobStatus::Failed);
    assert_eq!(
        records[0].error_message.as_deref(),
        Some("voice cloning failed")
    );
    assert_eq!(records[1].source_ref, "https://example.com/v/1");
    assert_eq!(records[1].status, JobStatus::Completed);
    assert_eq!(records[2].source_ref, "https://example.com/v/0");
    assert_eq!(records[2].status, JobStatus::Completed);

    // Every record is anchored to the submission, not the poll that saw it
    assert!(records.iter().all(|r| r.created_at == ctx.submitted_at));
    for record in &records {
        assert!(store.contains_outcome(&record.outcome_key()));
    }
}

/// Test that watching a finished batch a second time does not grow
/// the history, even with every in-memory gate rebuilt from scratch
#[tokio::test]
async fn test_workflow_rewatchAfterCompletion_shouldNotDuplicateRecords() {
    common::init_test_logging();

    let api = Arc::new(MockPipelineApi::completing("bulk-2", &["v0", "v1"]));
    let submitter = BatchSubmitter::new(Arc::clone(&api));
    let ctx = submitter
        .submit(url_request(&[
            "https://example.com/v/0",
            "https://example.com/v/1",
        ]))
        .await
        .expect("submission accepted");

    let (store, _backend) = common::memory_store();

    for _ in 0..2 {
        let saver = Arc::new(SaveCoordinator::new(Arc::clone(&store)));
        let cache = Arc::new(DiffCache::new(saver));
        let poller = BatchPoller::with_timing(Arc::clone(&api), cache, TICK, 5);
        let mut events = poller.start(ctx.clone());
        let (_seen, reason) = drain_until_stopped(&mut events).await;
        assert_eq!(reason, StopReason::Complete);
    }

    // Only the store-level duplicate check could have stopped these
    assert_eq!(store.len(), 2);
}

/// Test that a failure below the threshold does not interrupt tracking
#[tokio::test]
async fn test_workflow_withFlakyBackend_shouldRecoverAndFinish() {
    common::init_test_logging();

    let settled = common::status_of(vec![common::batch_item(
        "v0",
        JobStatus::Completed,
        Some(100.0),
    )]);
    let api = Arc::new(MockPipelineApi::with_script(
        "bulk-3",
        vec![
            MockStep::Fail("gateway hiccup".to_string()),
            MockStep::Status(settled),
        ],
    ));
    let submitter = BatchSubmitter::new(Arc::clone(&api));
    let ctx = submitter
        .submit(url_request(&["https://example.com/v/0"]))
        .await
        .expect("submission accepted");

    let (cache, store, _backend) = common::tracking_stack();
    let poller = BatchPoller::with_timing(Arc::clone(&api), cache, TICK, 5);
    let mut events = poller.start(ctx);

    let (seen, reason) = drain_until_stopped(&mut events).await;
    assert_eq!(reason, StopReason::Complete);

    assert!(matches!(
        seen[0],
        PollEvent::FetchFailed { consecutive: 1, .. }
    ));
    assert!(matches!(seen[1], PollEvent::Snapshot { .. }));
    assert_eq!(store.len(), 1);
    assert_eq!(store.load()[0].status, JobStatus::Completed);
}

/// Test that cancelling a watch mid-batch leaves no partial history
#[tokio::test]
async fn test_workflow_cancelWhileProcessing_shouldLeaveHistoryEmpty() {
    common::init_test_logging();

    let processing = common::status_of(vec![common::batch_item(
        "v0",
        JobStatus::Processing,
        Some(20.0),
    )]);
    let api = Arc::new(MockPipelineApi::with_script(
        "bulk-4",
        vec![MockStep::Status(processing)],
    ));
    let submitter = BatchSubmitter::new(Arc::clone(&api));
    let ctx = submitter
        .submit(url_request(&["https://example.com/v/0"]))
        .await
        .expect("submission accepted");

    let (cache, store, _backend) = common::tracking_stack();
    let poller = BatchPoller::with_timing(Arc::clone(&api), cache, TICK, 5);
    let mut events = poller.start(ctx);

    // Wait for a snapshot so the schedule is demonstrably live
    let first = tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("event before the deadline")
        .expect("a snapshot before the channel closes");
    assert!(matches!(first, PollEvent::Snapshot { .. }));

    poller.stop();
    let (_seen, reason) = drain_until_stopped(&mut events).await;
    assert_eq!(reason, StopReason::Cancelled);
    assert!(store.is_empty());
}
