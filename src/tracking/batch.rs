/*!
 * Batch tracking types shared between the submitter, the poller and
 * whatever renders progress.
 */

use serde::Serialize;
use std::fmt;

use crate::api::{BatchItem, BatchStatus};
use crate::job::{JobRecord, RunMode, display_name_for_source};

/// Identity and submitted composition of one tracked batch
#[derive(Debug, Clone)]
pub struct BatchContext {
    /// Batch handle issued by the pipeline
    pub batch_id: String,
    /// Number of items the pipeline registered
    pub total: u32,
    /// Submitted sources in item order: file paths first, then URLs
    pub sources: Vec<String>,
    /// Languages the batch is dubbed into
    pub target_languages: Vec<String>,
    /// How the batch was submitted
    pub mode: RunMode,
    /// When the batch was submitted (RFC 3339)
    pub submitted_at: String,
}

impl BatchContext {
    /// Create a context for a batch this process just submitted
    pub fn new(
        batch_id: impl Into<String>,
        total: u32,
        sources: Vec<String>,
        target_languages: Vec<String>,
        mode: RunMode,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            total,
            sources,
            target_languages,
            mode,
            submitted_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Attach to a batch submitted elsewhere. The sources are unknown,
    /// so records fall back to the names the pipeline reports.
    pub fn attached(batch_id: impl Into<String>) -> Self {
        Self::new(batch_id, 0, Vec::new(), Vec::new(), RunMode::Bulk)
    }

    /// The submitted source behind an item index, when known
    pub fn source_for(&self, index: usize) -> Option<&str> {
        self.sources.get(index).map(String::as_str)
    }

    /// Build the history record for an item that reached a terminal status
    pub fn record_for(&self, index: usize, item: &BatchItem) -> JobRecord {
        let source_ref = self
            .source_for(index)
            .unwrap_or(item.name.as_str())
            .to_string();
        let target_languages = if item.target_langs.is_empty() {
            self.target_languages.clone()
        } else {
            item.target_langs.clone()
        };

        let mut record = JobRecord::new(
            display_name_for_source(&source_ref),
            source_ref,
            target_languages,
            item.status,
            self.mode,
        );
        // Dedupe anchors on the submission timestamp, not the poll that
        // happened to observe the terminal status
        record.created_at = self.submitted_at.clone();
        record.completed_at = Some(chrono::Utc::now().to_rfc3339());
        record.result = item.result.clone();
        record.error_message = item.error.clone();
        record
    }
}

/// Render-ready progress counters for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    /// Items in the batch
    pub total: u32,
    /// Items waiting for a worker
    pub queued: u32,
    /// Items currently being dubbed
    pub processing: u32,
    /// Items that finished successfully
    pub completed: u32,
    /// Items that finished with an error
    pub failed: u32,
    /// Items that were cancelled
    pub cancelled: u32,
}

impl BatchProgress {
    /// Derive counters from a pipeline snapshot
    pub fn from_status(status: &BatchStatus) -> Self {
        Self {
            total: status.total,
            queued: status.queued,
            processing: status.processing,
            completed: status.completed,
            failed: status.failed,
            cancelled: status.cancelled(),
        }
    }

    /// Items that reached a terminal status. Cancelled items count as
    /// settled, not as failed.
    pub fn settled(&self) -> u32 {
        self.completed + self.failed + self.cancelled
    }

    /// Whether polling has nothing left to wait for
    pub fn is_settled(&self) -> bool {
        self.settled() >= self.total
    }
}

impl fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} settled ({} completed, {} failed, {} cancelled, {} processing, {} queued)",
            self.settled(),
            self.total,
            self.completed,
            self.failed,
            self.cancelled,
            self.processing,
            self.queued
        )
    }
}

/// Why a poller stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every item settled
    Complete,
    /// Too many consecutive poll failures
    ErrorThreshold,
    /// `stop()` was called
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Complete => write!(f, "complete"),
            StopReason::ErrorThreshold => write!(f, "error_threshold"),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One item's slice of a poll round
#[derive(Debug, Clone)]
pub struct ItemDelta {
    /// Position of the item in the batch
    pub index: usize,
    /// Whether the visible fields changed since the previous round
    pub changed: bool,
    /// The item as last reported
    pub item: BatchItem,
}

/// Events flowing from the poller to a renderer
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// A poll round succeeded
    Snapshot {
        /// Batch-level counters
        progress: BatchProgress,
        /// Per-item changes, in batch order
        deltas: Vec<ItemDelta>,
    },
    /// A poll round failed; polling continues while under the threshold
    FetchFailed {
        /// Consecutive failures so far
        consecutive: u32,
        /// Failures at which the poller gives up
        threshold: u32,
        /// What went wrong
        message: String,
    },
    /// Polling ended and will not resume on its own
    Stopped {
        /// Why polling ended
        reason: StopReason,
        /// Final counters, when the batch settled normally
        progress: Option<BatchProgress>,
    },
}
