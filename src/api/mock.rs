/*!
 * Mock pipeline implementations for testing.
 *
 * This module provides a scripted pipeline backend that simulates
 * different behaviors:
 * - `MockPipelineApi::with_script()` - Plays back a status sequence; the last step repeats
 * - `MockPipelineApi::completing()` - Reports the whole batch completed at once
 * - `MockPipelineApi::unreachable()` - Every call fails at the transport level
 * - `MockPipelineApi::submit_failure()` - Submissions are rejected by the server
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::api::{BatchItem, BatchStatus, BatchUpload, PipelineApi, SubmitReceipt};
use crate::errors::ApiError;
use crate::job::JobStatus;

/// One scripted poll response
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Answer the poll with this snapshot
    Status(BatchStatus),
    /// Fail the poll at the transport level with this message
    Fail(String),
}

/// Scripted pipeline backend for testing tracking behavior
#[derive(Debug)]
pub struct MockPipelineApi {
    /// Batch id handed out by submissions and accepted by polls
    batch_id: String,
    /// Poll responses, played in order; the last one repeats
    script: Mutex<Vec<MockStep>>,
    /// Next script position
    cursor: AtomicUsize,
    /// Server-side rejection for submissions, if any
    submit_rejection: Option<String>,
    /// When set, every call fails at the transport level
    unreachable: bool,
    /// Number of submit calls observed
    submit_calls: AtomicUsize,
    /// Number of status calls observed
    status_calls: AtomicUsize,
}

impl MockPipelineApi {
    /// Create a mock that plays back the given poll responses
    pub fn with_script(batch_id: impl Into<String>, script: Vec<MockStep>) -> Self {
        Self {
            batch_id: batch_id.into(),
            script: Mutex::new(script),
            cursor: AtomicUsize::new(0),
            submit_rejection: None,
            unreachable: false,
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock whose first poll already reports every item completed
    pub fn completing(batch_id: impl Into<String>, item_names: &[&str]) -> Self {
        let items: Vec<BatchItem> = item_names
            .iter()
            .map(|name| BatchItem {
                name: name.to_string(),
                status: JobStatus::Completed,
                progress: Some(100.0),
                error: None,
                result: None,
                target_langs: Vec::new(),
            })
            .collect();
        let status = BatchStatus {
            total: items.len() as u32,
            completed: items.len() as u32,
            processing: 0,
            queued: 0,
            failed: 0,
            items,
        };
        Self::with_script(batch_id, vec![MockStep::Status(status)])
    }

    /// Create a mock where every call fails at the transport level
    pub fn unreachable() -> Self {
        let mut mock = Self::with_script("unreachable", Vec::new());
        mock.unreachable = true;
        mock
    }

    /// Create a mock that rejects submissions with a server error
    pub fn submit_failure(message: impl Into<String>) -> Self {
        let mut mock = Self::with_script("rejected", Vec::new());
        mock.submit_rejection = Some(message.into());
        mock
    }

    /// Append a step to the script after construction
    pub fn push_step(&self, step: MockStep) {
        self.script.lock().push(step);
    }

    /// Number of submit calls this mock has served
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Number of status calls this mock has served
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Option<MockStep> {
        let script = self.script.lock();
        if script.is_empty() {
            return None;
        }
        let position = self.cursor.fetch_add(1, Ordering::SeqCst);
        let index = position.min(script.len() - 1);
        Some(script[index].clone())
    }
}

#[async_trait]
impl PipelineApi for MockPipelineApi {
    async fn submit_batch(&self, upload: BatchUpload) -> Result<SubmitReceipt, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        if self.unreachable {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        if let Some(message) = &self.submit_rejection {
            return Err(ApiError::Server {
                status_code: 500,
                message: message.clone(),
            });
        }

        Ok(SubmitReceipt {
            batch_id: self.batch_id.clone(),
            total: upload.item_count() as u32,
        })
    }

    async fn fetch_batch_status(&self, batch_id: &str) -> Result<BatchStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        if self.unreachable {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        if batch_id != self.batch_id {
            return Err(ApiError::Server {
                status_code: 404,
                message: format!("Unknown batch: {}", batch_id),
            });
        }

        match self.next_step() {
            Some(MockStep::Status(status)) => Ok(status),
            Some(MockStep::Fail(message)) => Err(ApiError::Transport(message)),
            None => Err(ApiError::Server {
                status_code: 404,
                message: format!("Unknown batch: {}", batch_id),
            }),
        }
    }
}
