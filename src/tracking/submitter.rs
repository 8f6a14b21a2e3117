/*!
 * Batch validation and submission.
 *
 * Validation is entirely local: a request that violates the batch
 * constraints is rejected before any network traffic. A failed
 * submission leaves nothing behind, no poller, no history writes, and
 * the in-flight guard released.
 */

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

use crate::api::{BatchUpload, FilePayload, PipelineApi, RunOptions};
use crate::errors::{AppError, ValidationError};
use crate::job::RunMode;
use crate::language_utils;
use crate::tracking::batch::BatchContext;

/// Most items one batch may carry
pub const MAX_BATCH_ITEMS: usize = 100;

/// File reads in flight at once while preparing an upload
const MAX_CONCURRENT_READS: usize = 4;

/// One batch submission request, before validation
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Local files to upload
    pub files: Vec<PathBuf>,
    /// Remote source URLs, one per entry; blank entries are ignored
    pub urls: Vec<String>,
    /// Source language code, or "auto" for detection
    pub source_language: String,
    /// Languages to dub into
    pub target_languages: Vec<String>,
    /// Optional collection the outputs are filed under
    pub target_work: Option<String>,
    /// Pipeline knobs forwarded untouched
    pub options: RunOptions,
}

impl Default for BatchRequest {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            urls: Vec::new(),
            source_language: "auto".to_string(),
            target_languages: Vec::new(),
            target_work: None,
            options: RunOptions::default(),
        }
    }
}

impl BatchRequest {
    /// The URL entries that actually count as items
    pub fn url_lines(&self) -> Vec<String> {
        self.urls
            .iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect()
    }

    /// Number of items this request would create
    pub fn item_count(&self) -> usize {
        self.files.len() + self.url_lines().len()
    }

    /// Check the batch constraints without touching the network
    pub fn validate(&self) -> Result<(), ValidationError> {
        let urls = self.url_lines();
        let count = self.files.len() + urls.len();

        if count == 0 {
            return Err(ValidationError::EmptyBatch);
        }
        if count > MAX_BATCH_ITEMS {
            return Err(ValidationError::TooManyItems {
                count,
                max: MAX_BATCH_ITEMS,
            });
        }

        for url in &urls {
            Url::parse(url).map_err(|_| ValidationError::InvalidUrl(url.clone()))?;
        }

        if self.target_languages.is_empty() {
            return Err(ValidationError::NoTargetLanguages);
        }
        for code in &self.target_languages {
            language_utils::validate_language_code(code)
                .map_err(|_| ValidationError::UnknownLanguage(code.clone()))?;
        }
        if !self.source_language.eq_ignore_ascii_case("auto") {
            language_utils::validate_language_code(&self.source_language)
                .map_err(|_| ValidationError::UnknownLanguage(self.source_language.clone()))?;
        }

        for file in &self.files {
            if !file.is_file() {
                return Err(ValidationError::FileNotFound(file.display().to_string()));
            }
        }

        Ok(())
    }

    /// Single runs and bulk runs are filed differently in the history
    pub fn mode(&self) -> RunMode {
        if self.item_count() == 1 {
            RunMode::Single
        } else {
            RunMode::Bulk
        }
    }
}

/// Clears the in-flight flag when the submission attempt ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Validates and submits batches, one at a time
pub struct BatchSubmitter<A: PipelineApi> {
    api: Arc<A>,
    in_flight: AtomicBool,
}

impl<A: PipelineApi> BatchSubmitter<A> {
    /// Create a submitter over the given pipeline client
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether a submission is currently in flight. Presentation layers
    /// disable mode switches while this is true.
    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Validate and submit a batch.
    ///
    /// On success the returned context carries the batch identity and
    /// the submitted sources, ready to hand to a poller. On any failure
    /// no partial state is left behind.
    pub async fn submit(&self, request: BatchRequest) -> Result<BatchContext, AppError> {
        request.validate()?;

        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(AppError::SubmissionInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let url_lines = request.url_lines();
        let files = Self::load_payloads(&request.files).await?;

        let mut sources: Vec<String> = request
            .files
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        sources.extend(url_lines.iter().cloned());

        let target_languages: Vec<String> = request
            .target_languages
            .iter()
            .map(|code| {
                language_utils::normalize_for_pipeline(code).unwrap_or_else(|_| code.clone())
            })
            .collect();

        debug!(
            "Submitting {} file(s) and {} URL(s) for {:?}",
            files.len(),
            url_lines.len(),
            target_languages
        );

        let upload = BatchUpload {
            files,
            url_lines,
            source_language: request.source_language.to_lowercase(),
            target_languages: target_languages.clone(),
            target_work: request.target_work.clone(),
            options: request.options.clone(),
        };

        let receipt = self.api.submit_batch(upload).await?;
        info!(
            "Batch {} accepted with {} item(s)",
            receipt.batch_id, receipt.total
        );

        Ok(BatchContext::new(
            receipt.batch_id,
            receipt.total,
            sources,
            target_languages,
            request.mode(),
        ))
    }

    /// Read the files for an upload, a few at a time, preserving order
    async fn load_payloads(paths: &[PathBuf]) -> Result<Vec<FilePayload>, AppError> {
        let results: Vec<(usize, Result<FilePayload, String>)> =
            stream::iter(paths.iter().cloned().enumerate())
                .map(|(index, path)| async move {
                    let outcome = match tokio::fs::read(&path).await {
                        Ok(content) => Ok(FilePayload {
                            file_name: path
                                .file_name()
                                .map(|name| name.to_string_lossy().into_owned())
                                .unwrap_or_else(|| path.display().to_string()),
                            content: Bytes::from(content),
                        }),
                        Err(e) => Err(format!("Failed to read {}: {}", path.display(), e)),
                    };
                    (index, outcome)
                })
                .buffer_unordered(MAX_CONCURRENT_READS)
                .collect()
                .await;

        let mut sorted_results = results;
        sorted_results.sort_by_key(|(index, _)| *index);

        let mut payloads = Vec::with_capacity(sorted_results.len());
        for (_, outcome) in sorted_results {
            payloads.push(outcome.map_err(AppError::File)?);
        }
        Ok(payloads)
    }
}
