/*!
 * Error types for the dubtrack application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

// Allow dead code - error types are for library consumers
#![allow(dead_code)]

use thiserror::Error;

/// Errors raised while validating a batch before submission
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The batch contains neither files nor URLs
    #[error("Batch contains no items")]
    EmptyBatch,

    /// The batch exceeds the per-request item limit
    #[error("Batch of {count} items exceeds the limit of {max}")]
    TooManyItems {
        /// Number of items in the rejected batch
        count: usize,
        /// Maximum number of items accepted per batch
        max: usize,
    },

    /// A URL line could not be parsed
    #[error("Not a valid URL: {0}")]
    InvalidUrl(String),

    /// No target language was given
    #[error("No target languages given")]
    NoTargetLanguages,

    /// A language code did not resolve to a known language
    #[error("Unknown language code: {0}")]
    UnknownLanguage(String),

    /// A submitted file path does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Errors that can occur when talking to the pipeline API
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never produced a response
    #[error("Request transport failed: {0}")]
    Transport(String),

    /// The pipeline answered with a non-success status
    #[error("Pipeline responded with error: {status_code} - {message}")]
    Server {
        /// HTTP status code
        status_code: u16,
        /// Error message from the pipeline
        message: String,
    },

    /// The response body could not be decoded
    #[error("Failed to parse pipeline response: {0}")]
    Parse(String),
}

/// Errors that can occur while persisting history
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The storage slot is out of space
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other I/O failure
    #[error("History I/O failed: {0}")]
    Io(String),

    /// The record list could not be encoded
    #[error("Failed to encode history: {0}")]
    Serialize(String),
}

impl PersistenceError {
    /// Whether this failure should trigger the quota fallback path
    pub fn is_quota(&self) -> bool {
        matches!(self, PersistenceError::QuotaExceeded(_))
    }
}

/// A stored history blob that is no longer valid JSON
#[derive(Error, Debug)]
#[error("History blob is not decodable: {detail}")]
pub struct CorruptionError {
    /// Decoder detail for the log line
    pub detail: String,
}

impl CorruptionError {
    pub fn new(detail: impl Into<String>) -> Self {
        CorruptionError { detail: detail.into() }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from batch validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Error from the pipeline API
    #[error("Pipeline error: {0}")]
    Api(#[from] ApiError),

    /// Error from history persistence
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Error from a corrupt history blob
    #[error("Corruption error: {0}")]
    Corruption(#[from] CorruptionError),

    /// A submission was attempted while another is in flight
    #[error("A batch submission is already in flight")]
    SubmissionInFlight,

    /// Error in the application configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
