/*!
 * Durable local history of job outcomes.
 *
 * This module provides the capped JSON-document persistence for:
 * - Recorded terminal outcomes, most recent first
 * - Quota degradation (trim and retry once)
 * - Corruption quarantine and recovery
 */

pub mod backend;
pub mod store;

// Re-export main types
pub use backend::{FileBackend, HistoryBackend, MemoryBackend, WriteFailure};
pub use store::{HISTORY_CAPACITY, HistoryExport, HistoryStore, QUOTA_FALLBACK_CAPACITY};
