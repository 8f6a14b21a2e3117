/*!
 * Tests for exactly-once outcome recording under concurrency
 */

use std::sync::Arc;

use dubtrack::job::ResultRefs;
use dubtrack::tracking::SaveCoordinator;

use crate::common;

/// Test the base case: one outcome, one record
#[tokio::test]
async fn test_recordOutcome_withNewOutcome_shouldPersist() {
    let (store, _backend) = common::memory_store();
    let saver = SaveCoordinator::new(Arc::clone(&store));

    let record = common::completed_record("clip", "https://example.com/clip");
    assert!(saver.record_outcome(record).await);
    assert_eq!(store.len(), 1);
}

/// Test that an outcome already in the store is not recorded again
#[tokio::test]
async fn test_recordOutcome_withAlreadyPersistedOutcome_shouldReturnFalse() {
    let (store, _backend) = common::memory_store();
    let saver = SaveCoordinator::new(Arc::clone(&store));

    let record = common::completed_record("clip", "https://example.com/clip");
    assert!(store.append(record.clone()));

    assert!(!saver.record_outcome(record).await);
    assert_eq!(store.len(), 1);
}

/// Test two racing saves of the same outcome: exactly one wins
#[tokio::test]
async fn test_recordOutcome_withConcurrentDuplicates_shouldPersistExactlyOnce() {
    let (store, _backend) = common::memory_store();
    let saver = Arc::new(SaveCoordinator::new(Arc::clone(&store)));

    let mut record = common::completed_record("clip", "https://example.com/clip");
    record.result = Some(ResultRefs {
        video_url: Some("/outputs/clip_fr.mp4".to_string()),
        ..ResultRefs::default()
    });

    let (first, second) = tokio::join!(
        saver.record_outcome(record.clone()),
        saver.record_outcome(record.clone())
    );

    // Exactly one caller persisted the outcome
    assert!(first ^ second);
    assert_eq!(store.len(), 1);
}

/// Test a pile-up of racing saves across several tasks
#[tokio::test]
async fn test_recordOutcome_withManyConcurrentTasks_shouldPersistExactlyOnce() {
    let (store, _backend) = common::memory_store();
    let saver = Arc::new(SaveCoordinator::new(Arc::clone(&store)));

    let record = common::completed_record("clip", "https://example.com/clip");
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let saver = Arc::clone(&saver);
            let record = record.clone();
            tokio::spawn(async move { saver.record_outcome(record).await })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(store.len(), 1);
}

/// Test that distinct outcomes do not block each other
#[tokio::test]
async fn test_recordOutcome_withDistinctOutcomes_shouldPersistBoth() {
    let (store, _backend) = common::memory_store();
    let saver = Arc::new(SaveCoordinator::new(Arc::clone(&store)));

    let (first, second) = tokio::join!(
        saver.record_outcome(common::completed_record("a", "https://example.com/a")),
        saver.record_outcome(common::completed_record("b", "https://example.com/b"))
    );

    assert!(first && second);
    assert_eq!(store.len(), 2);
}

/// Test that per-outcome gates are dropped once uncontended
#[tokio::test]
async fn test_gateCount_afterQuietPeriod_shouldBeZero() {
    let (store, _backend) = common::memory_store();
    let saver = Arc::new(SaveCoordinator::new(Arc::clone(&store)));

    for record in common::record_batch(5) {
        saver.record_outcome(record).await;
    }

    assert_eq!(saver.gate_count(), 0);
    assert_eq!(store.len(), 5);
}
