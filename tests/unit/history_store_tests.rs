/*!
 * Tests for history persistence: capacity, dedupe, quota fallback
 * and corruption recovery
 */

use dubtrack::history::{
    HISTORY_CAPACITY, HistoryStore, MemoryBackend, QUOTA_FALLBACK_CAPACITY, WriteFailure,
};
use dubtrack::job::JobStatus;

use crate::common;

/// Test that an append lands at the head with a fresh id
#[test]
fn test_append_withNewRecord_shouldInsertAtHeadAndAssignId() {
    let (store, _backend) = common::memory_store();

    assert!(store.append(common::completed_record("first", "https://example.com/1")));
    assert!(store.append(common::completed_record("second", "https://example.com/2")));

    let records = store.load();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "second");
    assert_eq!(records[1].name, "first");
    assert!(!records[0].id.is_empty());
    assert_ne!(records[0].id, records[1].id);
}

/// Test the duplicate guard on (source, submission time)
#[test]
fn test_append_withSameSourceAndTimestamp_shouldRejectDuplicate() {
    let (store, _backend) = common::memory_store();

    let record = common::completed_record("clip", "https://example.com/clip");
    assert!(store.append(record.clone()));
    assert!(!store.append(record.clone()));
    assert_eq!(store.len(), 1);

    // Same source submitted at another time is a new outcome
    let mut later = record;
    later.created_at = "2030-01-01T00:00:00+00:00".to_string();
    assert!(store.append(later));
    assert_eq!(store.len(), 2);
}

/// Test that malformed records never reach the backend
#[test]
fn test_append_withBlankName_shouldRejectRecord() {
    let (store, backend) = common::memory_store();

    let mut record = common::completed_record(" ", "https://example.com/clip");
    record.name = "   ".to_string();
    assert!(!store.append(record));
    assert_eq!(backend.write_attempts(), 0);
    assert!(store.is_empty());
}

/// Test the hard cap on stored records
#[test]
fn test_append_beyondCapacity_shouldEvictOldestRecords() {
    let (store, _backend) = common::memory_store();

    for record in common::record_batch(HISTORY_CAPACITY + 5) {
        assert!(store.append(record));
    }

    let records = store.load();
    assert_eq!(records.len(), HISTORY_CAPACITY);
    // Newest-first: the last appended record is at the head
    assert_eq!(records[0].name, format!("clip-{}", HISTORY_CAPACITY + 4));
    // The five oldest fell off the tail
    assert!(records.iter().all(|r| r.name != "clip-0"));
    assert!(records.iter().all(|r| r.name != "clip-4"));
}

/// Test the quota fallback: trim to the reduced capacity and retry once
#[test]
fn test_append_withQuotaFailure_shouldTrimAndRetryOnce() {
    let (store, backend) = common::memory_store();

    for record in common::record_batch(40) {
        assert!(store.append(record));
    }
    let attempts_before = backend.write_attempts();

    backend.fail_next_writes(WriteFailure::Quota, 1);
    let extra = common::completed_record("straw", "https://example.com/straw");
    assert!(store.append(extra));

    // One failed write plus the successful retry
    assert_eq!(backend.write_attempts(), attempts_before + 2);

    let records = store.load();
    assert_eq!(records.len(), QUOTA_FALLBACK_CAPACITY);
    assert_eq!(records[0].name, "straw");

    // The trim is not sticky: the next successful append grows the list again
    let next = common::completed_record("camel", "https://example.com/camel");
    assert!(store.append(next));
    assert_eq!(store.len(), QUOTA_FALLBACK_CAPACITY + 1);
}

/// Test that a failing retry reports failure and persists nothing new
#[test]
fn test_append_withPersistentQuotaFailure_shouldReturnFalse() {
    let (store, backend) = common::memory_store();

    for record in common::record_batch(30) {
        assert!(store.append(record));
    }

    backend.fail_next_writes(WriteFailure::Quota, 2);
    let extra = common::completed_record("straw", "https://example.com/straw");
    assert!(!store.append(extra));

    // The record is not present in the next load
    let records = store.load();
    assert_eq!(records.len(), 30);
    assert!(records.iter().all(|r| r.name != "straw"));
}

/// Test that non-quota failures do not trigger the trim fallback
#[test]
fn test_append_withIoFailure_shouldFailWithoutTrimming() {
    let (store, backend) = common::memory_store();

    for record in common::record_batch(30) {
        assert!(store.append(record));
    }
    let attempts_before = backend.write_attempts();

    backend.fail_next_writes(WriteFailure::Io, 1);
    assert!(!store.append(common::completed_record("x", "https://example.com/x")));

    // No retry for plain I/O errors
    assert_eq!(backend.write_attempts(), attempts_before + 1);
    assert_eq!(store.len(), 30);
}

/// Test corruption recovery: quarantine the blob and start empty
#[test]
fn test_load_withCorruptBlob_shouldQuarantineAndStartEmpty() {
    let (store, backend) = common::memory_store();
    backend.set_contents("{not json at all");

    let records = store.load();
    assert!(records.is_empty());

    // The bad blob is parked, the primary slot is reset
    assert_eq!(backend.quarantined().as_deref(), Some("{not json at all"));
    assert_eq!(backend.contents().as_deref(), Some("[]"));

    // The store keeps working afterwards
    assert!(store.append(common::completed_record("fresh", "https://example.com/f")));
    assert_eq!(store.len(), 1);
}

/// Test that a well-formed JSON blob of the wrong shape also quarantines
#[test]
fn test_load_withWrongJsonShape_shouldQuarantine() {
    let (store, backend) = common::memory_store();
    backend.set_contents(r#"{"records": "should be a list"}"#);

    assert!(store.load().is_empty());
    assert!(backend.quarantined().is_some());
}

/// Test delete by index
#[test]
fn test_delete_withValidIndex_shouldRemoveRecord() {
    let (store, _backend) = common::memory_store();
    for record in common::record_batch(3) {
        store.append(record);
    }

    // Index 1 is clip-1 (newest-first: clip-2, clip-1, clip-0)
    assert!(store.delete(1));
    let records = store.load();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "clip-2");
    assert_eq!(records[1].name, "clip-0");
}

/// Test that out-of-range deletes change nothing
#[test]
fn test_delete_withOutOfRangeIndex_shouldBeNoOp() {
    let (store, backend) = common::memory_store();
    store.append(common::completed_record("only", "https://example.com/only"));
    let attempts_before = backend.write_attempts();

    assert!(!store.delete(5));
    assert_eq!(store.len(), 1);
    assert_eq!(backend.write_attempts(), attempts_before);
}

/// Test the export envelope
#[test]
fn test_exportSnapshot_shouldWrapRecordsWithMetadata() {
    let (store, _backend) = common::memory_store();
    for record in common::record_batch(4) {
        store.append(record);
    }

    let snapshot = store.export_snapshot();
    assert_eq!(snapshot.count, 4);
    assert_eq!(snapshot.records.len(), 4);
    assert!(!snapshot.exported_at.is_empty());
    assert_eq!(snapshot.records[0].status, JobStatus::Completed);

    // The envelope serializes with its three fields
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"exported_at\""));
    assert!(json.contains("\"count\":4"));
    assert!(json.contains("\"records\""));
}

/// Test loading from an empty backend
#[test]
fn test_load_withEmptyBackend_shouldReturnEmptyList() {
    let (store, _backend) = common::memory_store();
    assert!(store.load().is_empty());
    assert!(store.is_empty());
}
