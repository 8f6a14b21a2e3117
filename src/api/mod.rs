/*!
 * Client implementations for the dubbing pipeline API.
 *
 * This module defines the wire contract of the pipeline backend and the
 * clients that speak it:
 * - `http`: reqwest client for a live backend
 * - `mock`: scripted in-memory client for tests
 */

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::ApiError;
use crate::job::{JobStatus, ResultRefs};

/// Common trait for pipeline backends
///
/// This trait defines the two operations the tracking layer needs,
/// allowing the HTTP client and test doubles to be used interchangeably.
#[async_trait]
pub trait PipelineApi: Send + Sync + Debug {
    /// Submit a batch of sources for dubbing
    ///
    /// # Arguments
    /// * `upload` - The files, URLs and options to submit
    ///
    /// # Returns
    /// * `Result<SubmitReceipt, ApiError>` - The accepted batch handle or an error
    async fn submit_batch(&self, upload: BatchUpload) -> Result<SubmitReceipt, ApiError>;

    /// Fetch the current status of a previously submitted batch
    ///
    /// # Arguments
    /// * `batch_id` - The batch handle returned at submission
    ///
    /// # Returns
    /// * `Result<BatchStatus, ApiError>` - The batch snapshot or an error
    async fn fetch_batch_status(&self, batch_id: &str) -> Result<BatchStatus, ApiError>;
}

/// One file carried in a batch upload
#[derive(Debug, Clone)]
pub struct FilePayload {
    /// File name reported to the pipeline
    pub file_name: String,
    /// Raw file content
    pub content: Bytes,
}

/// Pass-through knobs forwarded to the pipeline untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Speech recognition model
    #[serde(default = "default_asr_model")]
    pub asr_model: String,
    /// Translation backend
    #[serde(default = "default_translation_model")]
    pub translation_model: String,
    /// Speech synthesis model
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    /// How translations are produced (direct or pivoted)
    #[serde(default = "default_translation_strategy")]
    pub translation_strategy: String,
    /// How the dub is mixed against the original audio
    #[serde(default = "default_dubbing_strategy")]
    pub dubbing_strategy: String,
}

fn default_asr_model() -> String {
    "whisperx".to_string()
}

fn default_translation_model() -> String {
    "deep_translator".to_string()
}

fn default_tts_model() -> String {
    "chatterbox".to_string()
}

fn default_translation_strategy() -> String {
    "direct".to_string()
}

fn default_dubbing_strategy() -> String {
    "keep_bg_music".to_string()
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            asr_model: default_asr_model(),
            translation_model: default_translation_model(),
            tts_model: default_tts_model(),
            translation_strategy: default_translation_strategy(),
            dubbing_strategy: default_dubbing_strategy(),
        }
    }
}

/// Everything sent to the pipeline in one submission
#[derive(Debug, Clone)]
pub struct BatchUpload {
    /// Uploaded files, in submission order
    pub files: Vec<FilePayload>,
    /// Remote source URLs, one per line on the wire
    pub url_lines: Vec<String>,
    /// Source language code, or "auto" for detection
    pub source_language: String,
    /// Languages to dub into
    pub target_languages: Vec<String>,
    /// Optional collection the outputs are filed under
    pub target_work: Option<String>,
    /// Pipeline knobs
    pub options: RunOptions,
}

impl BatchUpload {
    /// Number of items the pipeline will create from this upload
    pub fn item_count(&self) -> usize {
        self.files.len() + self.url_lines.len()
    }
}

/// Handle returned by the pipeline for an accepted batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Identifier to poll the batch under
    pub batch_id: String,
    /// Number of items the pipeline registered
    pub total: u32,
}

/// One item inside a batch status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// Item name as the pipeline reports it
    pub name: String,
    /// Current lifecycle status
    pub status: JobStatus,
    /// Progress within the current stage, 0.0 to 100.0
    #[serde(default)]
    pub progress: Option<f32>,
    /// Error detail for failed items
    #[serde(default)]
    pub error: Option<String>,
    /// Artifact locators once the item completed
    #[serde(default)]
    pub result: Option<ResultRefs>,
    /// Languages this item is dubbed into
    #[serde(default)]
    pub target_langs: Vec<String>,
}

/// Snapshot of a whole batch as reported by the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatus {
    /// Number of items in the batch
    pub total: u32,
    /// Items that finished successfully
    pub completed: u32,
    /// Items currently being dubbed
    pub processing: u32,
    /// Items waiting for a worker
    pub queued: u32,
    /// Items that finished with an error
    pub failed: u32,
    /// Per-item detail, in batch order
    #[serde(default, rename = "videos")]
    pub items: Vec<BatchItem>,
}

impl BatchStatus {
    /// Items that ended in `cancelled`, which the aggregate counters
    /// do not report separately
    pub fn cancelled(&self) -> u32 {
        self.items
            .iter()
            .filter(|item| item.status == JobStatus::Cancelled)
            .count() as u32
    }
}

pub mod http;
pub mod mock;
