/*!
 * Domain model for tracked dubbing jobs.
 *
 * These structures are shared between the wire layer and the persisted
 * history, so their serde shapes are the contract with both the pipeline
 * API and older history blobs on disk.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Lifecycle status of a single dubbing job.
///
/// The canonical spelling of the successful terminal state is `completed`.
/// The pipeline historically reported `complete` for the same state, so
/// that spelling is accepted on input but never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job accepted, waiting for a worker
    Queued,
    /// Job is being dubbed
    Processing,
    /// Job finished successfully
    #[serde(alias = "complete")]
    Completed,
    /// Job finished with an error
    Failed,
    /// Job was cancelled before finishing
    Cancelled,
}

impl JobStatus {
    /// Whether this status is absorbing. Nothing in this crate moves a
    /// record out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" | "complete" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// How a job was submitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// One source submitted on its own
    #[default]
    Single,
    /// Source was part of a multi-item batch
    Bulk,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Single => write!(f, "single"),
            RunMode::Bulk => write!(f, "bulk"),
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(RunMode::Single),
            "bulk" => Ok(RunMode::Bulk),
            _ => Err(anyhow::anyhow!("Invalid run mode: {}", s)),
        }
    }
}

/// Locators for the artifacts a finished job produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRefs {
    /// Dubbed video download location
    #[serde(default)]
    pub video_url: Option<String>,
    /// Dubbed audio track location
    #[serde(default)]
    pub audio_url: Option<String>,
    /// Raw synthesized audio location, before mixing
    #[serde(default)]
    pub raw_audio_url: Option<String>,
}

impl ResultRefs {
    /// The most useful locator, preferring the full video
    pub fn primary(&self) -> Option<&str> {
        self.video_url
            .as_deref()
            .or(self.audio_url.as_deref())
            .or(self.raw_audio_url.as_deref())
    }

    /// Whether any artifact locator is present
    pub fn is_empty(&self) -> bool {
        self.primary().is_none()
    }
}

/// One recorded job outcome in the local history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique record identifier (UUID), assigned by the store on append
    #[serde(default)]
    pub id: String,
    /// Human-readable name for the source
    pub name: String,
    /// The submitted source: a file name or a URL
    #[serde(default)]
    pub source_ref: String,
    /// Languages the source was dubbed into
    #[serde(default)]
    pub target_languages: Vec<String>,
    /// Terminal status the job ended in
    pub status: JobStatus,
    /// How the job was submitted
    #[serde(default)]
    pub mode: RunMode,
    /// Submission timestamp (RFC 3339)
    pub created_at: String,
    /// Terminal timestamp (RFC 3339), if observed
    #[serde(default)]
    pub completed_at: Option<String>,
    /// Artifact locators, if the job produced any
    #[serde(default)]
    pub result: Option<ResultRefs>,
    /// Error detail for failed jobs
    #[serde(default)]
    pub error_message: Option<String>,
    /// Progress log lines captured while the job ran, if any
    #[serde(default)]
    pub logs: Vec<String>,
}

impl JobRecord {
    /// Create a new record stamped with the current time
    pub fn new(
        name: String,
        source_ref: String,
        target_languages: Vec<String>,
        status: JobStatus,
        mode: RunMode,
    ) -> Self {
        Self {
            id: String::new(), // Assigned by the store on append
            name,
            source_ref,
            target_languages,
            status,
            mode,
            created_at: chrono::Utc::now().to_rfc3339(),
            completed_at: None,
            result: None,
            error_message: None,
            logs: Vec::new(),
        }
    }

    /// Duplicate-detection key: the source plus either the primary result
    /// locator or, when the job produced nothing, the terminal timestamp.
    pub fn outcome_key(&self) -> String {
        let anchor = self
            .result
            .as_ref()
            .and_then(|r| r.primary())
            .or(self.completed_at.as_deref())
            .unwrap_or(&self.created_at);
        format!("{}::{}", self.source_ref, anchor)
    }

    /// Whether the record carries enough to be worth persisting
    pub fn is_well_formed(&self) -> bool {
        !self.name.trim().is_empty() && !self.created_at.trim().is_empty()
    }
}

static YOUTUBE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtube\.com/(?:watch\?(?:.*&)?v=|shorts/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})")
        .unwrap()
});

/// Derive a display name from a source reference.
///
/// YouTube URLs collapse to `youtube:<video id>`, file paths to their stem,
/// and anything else passes through unchanged.
pub fn display_name_for_source(source: &str) -> String {
    if let Some(caps) = YOUTUBE_ID.captures(source) {
        return format!("youtube:{}", &caps[1]);
    }
    if source.contains("://") {
        return source.to_string();
    }
    Path::new(source)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string())
}
