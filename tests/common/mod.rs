/*!
 * Common test utilities for the dubtrack test suite
 */

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use dubtrack::api::{BatchItem, BatchStatus};
use dubtrack::history::{HistoryBackend, HistoryStore, MemoryBackend};
use dubtrack::job::{JobRecord, JobStatus, RunMode};
use dubtrack::tracking::{DiffCache, SaveCoordinator};

/// Routes crate logs into the test harness when RUST_LOG is set
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &PathBuf, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a small stand-in media file for upload tests
pub fn create_test_media(dir: &PathBuf, filename: &str) -> Result<PathBuf> {
    create_test_file(dir, filename, "0000 stand-in media payload 0000")
}

/// A memory-backed history store plus a handle on its backend
pub fn memory_store() -> (Arc<HistoryStore>, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(HistoryStore::new(
        Arc::clone(&backend) as Arc<dyn HistoryBackend>
    ));
    (store, backend)
}

/// A diff cache wired to a memory-backed store
pub fn tracking_stack() -> (Arc<DiffCache>, Arc<HistoryStore>, Arc<MemoryBackend>) {
    let (store, backend) = memory_store();
    let saver = Arc::new(SaveCoordinator::new(Arc::clone(&store)));
    (Arc::new(DiffCache::new(saver)), store, backend)
}

/// A job record in a terminal state
pub fn completed_record(name: &str, source_ref: &str) -> JobRecord {
    let mut record = JobRecord::new(
        name.to_string(),
        source_ref.to_string(),
        vec!["fr".to_string()],
        JobStatus::Completed,
        RunMode::Bulk,
    );
    record.completed_at = Some(record.created_at.clone());
    record
}

/// Distinct completed records for capacity tests
pub fn record_batch(count: usize) -> Vec<JobRecord> {
    (0..count)
        .map(|index| {
            completed_record(
                &format!("clip-{}", index),
                &format!("https://example.com/v/{}", index),
            )
        })
        .collect()
}

/// One item snapshot as the pipeline would report it
pub fn batch_item(name: &str, status: JobStatus, progress: Option<f32>) -> BatchItem {
    BatchItem {
        name: name.to_string(),
        status,
        progress,
        error: None,
        result: None,
        target_langs: Vec::new(),
    }
}

/// A status snapshot with counters derived from the items
pub fn status_of(items: Vec<BatchItem>) -> BatchStatus {
    let count =
        |status: JobStatus| items.iter().filter(|item| item.status == status).count() as u32;
    BatchStatus {
        total: items.len() as u32,
        completed: count(JobStatus::Completed),
        processing: count(JobStatus::Processing),
        queued: count(JobStatus::Queued),
        failed: count(JobStatus::Failed),
        items,
    }
}
