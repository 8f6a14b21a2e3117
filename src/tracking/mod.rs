/*!
 * Client-side tracking of dubbing batches.
 *
 * This module contains the whole submission-to-history flow:
 * - `submitter`: validation and multipart submission
 * - `poller`: the scheduled polling state machine
 * - `diff_cache`: incremental updates and one-time side effects
 * - `save_coordinator`: exactly-once outcome persistence
 * - `batch`: the types the pieces exchange
 *
 * Control flows submitter → poller → diff cache → save coordinator →
 * history store; nothing calls back upward except through events.
 */

pub mod batch;
pub mod diff_cache;
pub mod poller;
pub mod save_coordinator;
pub mod submitter;

// Re-export main types
pub use batch::{BatchContext, BatchProgress, ItemDelta, PollEvent, StopReason};
pub use diff_cache::DiffCache;
pub use poller::{
    BatchPoller, DEFAULT_FAILURE_THRESHOLD, DEFAULT_POLL_INTERVAL, PollPhase, TickOutcome,
};
pub use save_coordinator::SaveCoordinator;
pub use submitter::{BatchRequest, BatchSubmitter, MAX_BATCH_ITEMS};
