/*!
 * # DubTrack - Batch tracking client for an AI dubbing pipeline
 *
 * A Rust library for submitting media batches to an AI dubbing backend
 * and tracking them to completion.
 *
 * ## Features
 *
 * - Submit up to 100 files and URLs as one dubbing batch
 * - Validate batches locally before anything touches the network
 * - Poll batch status on a fixed schedule with stale-response fencing
 * - Render incremental per-item progress from status diffs
 * - Record each finished item into a local JSON history exactly once
 * - Cap, trim and quarantine the history file so it can always load
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `api`: Pipeline backend client:
 *   - `api::http`: reqwest implementation over the bulk endpoints
 *   - `api::mock`: scripted in-memory backend for tests
 * - `tracking`: Batch lifecycle:
 *   - `tracking::submitter`: validation and batch submission
 *   - `tracking::poller`: fixed-interval status polling
 *   - `tracking::diff_cache`: per-item change detection
 *   - `tracking::save_coordinator`: exactly-once outcome recording
 * - `history`: Persisted job history and its storage backends
 * - `console`: Progress bar and table rendering
 * - `job`: Job records and status vocabulary
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod api;
pub mod app_config;
pub mod console;
pub mod errors;
pub mod history;
pub mod job;
pub mod language_utils;
pub mod tracking;

// Re-export main types for easier usage
pub use api::{BatchStatus, PipelineApi};
pub use app_config::Config;
pub use errors::{ApiError, AppError, PersistenceError, ValidationError};
pub use history::{FileBackend, HistoryStore};
pub use job::{JobRecord, JobStatus};
pub use language_utils::{get_language_name, normalize_for_pipeline};
pub use tracking::{BatchPoller, BatchRequest, BatchSubmitter, DiffCache, SaveCoordinator};
