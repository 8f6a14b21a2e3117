/*!
 * Storage backends for the job history.
 *
 * A backend is a single slot holding one JSON blob, plus a quarantine
 * slot beside it for blobs that stopped decoding. The file backend is
 * the production one; the memory backend exists for tests and supports
 * scripted write failures.
 */

use log::{debug, info};
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::errors::PersistenceError;

/// Default history filename
const DEFAULT_HISTORY_FILENAME: &str = "history.json";

/// Default history directory name under the user's data directory
const DEFAULT_HISTORY_DIRNAME: &str = "dubtrack";

/// Extension given to quarantined blobs
const QUARANTINE_EXTENSION: &str = "corrupt.json";

/// A slot that can hold one history blob
pub trait HistoryBackend: Send + Sync {
    /// Read the current blob, `None` when the slot is empty
    fn read(&self) -> Result<Option<String>, PersistenceError>;

    /// Replace the blob
    fn write(&self, payload: &str) -> Result<(), PersistenceError>;

    /// Park a blob in the quarantine slot next to the primary one
    fn quarantine(&self, payload: &str) -> Result<(), PersistenceError>;
}

/// History backend over a JSON file, written atomically via temp file rename
pub struct FileBackend {
    /// Path of the primary slot
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a backend at the default location
    pub fn new_default() -> anyhow::Result<Self> {
        Ok(Self::new(Self::default_history_path()?))
    }

    /// Get the default history path
    pub fn default_history_path() -> anyhow::Result<PathBuf> {
        // Try to use the system data directory
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

        Ok(base_dir
            .join(DEFAULT_HISTORY_DIRNAME)
            .join(DEFAULT_HISTORY_FILENAME))
    }

    /// Path of the quarantine slot beside the primary one
    pub fn quarantine_path(&self) -> PathBuf {
        self.path.with_extension(QUARANTINE_EXTENSION)
    }

    /// Map out-of-space conditions to the quota error, everything else to I/O
    fn classify(error: io::Error) -> PersistenceError {
        let out_of_space = matches!(
            error.kind(),
            io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded
        ) || error.raw_os_error() == Some(28); // ENOSPC
        if out_of_space {
            PersistenceError::QuotaExceeded(error.to_string())
        } else {
            PersistenceError::Io(error.to_string())
        }
    }
}

impl HistoryBackend for FileBackend {
    fn read(&self) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(&self.path) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::Io(e.to_string())),
        }
    }

    fn write(&self, payload: &str) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(Self::classify)?;
        }

        // Write-then-rename so a crash mid-write never leaves a torn blob
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(Self::classify)?;
        staged
            .write_all(payload.as_bytes())
            .map_err(Self::classify)?;
        staged
            .persist(&self.path)
            .map_err(|e| Self::classify(e.error))?;

        debug!("Wrote {} bytes of history to {:?}", payload.len(), self.path);
        Ok(())
    }

    fn quarantine(&self, payload: &str) -> Result<(), PersistenceError> {
        let target = self.quarantine_path();
        fs::write(&target, payload).map_err(Self::classify)?;
        info!("Parked undecodable history blob at {:?}", target);
        Ok(())
    }
}

/// What a scripted write failure should look like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFailure {
    /// Fail as an out-of-space condition
    Quota,
    /// Fail as a generic I/O error
    Io,
}

/// In-memory backend (for testing)
#[derive(Default)]
pub struct MemoryBackend {
    slot: Mutex<Option<String>>,
    quarantine_slot: Mutex<Option<String>>,
    /// Remaining scripted failures, consumed one per write
    scripted_failures: Mutex<Vec<WriteFailure>>,
    write_attempts: Mutex<usize>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` writes with the given failure, then recover
    pub fn fail_next_writes(&self, failure: WriteFailure, count: usize) {
        let mut scripted = self.scripted_failures.lock();
        scripted.clear();
        scripted.extend(std::iter::repeat(failure).take(count));
    }

    /// Current blob in the primary slot
    pub fn contents(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    /// Seed the primary slot directly
    pub fn set_contents(&self, payload: impl Into<String>) {
        *self.slot.lock() = Some(payload.into());
    }

    /// Current blob in the quarantine slot
    pub fn quarantined(&self) -> Option<String> {
        self.quarantine_slot.lock().clone()
    }

    /// Number of write attempts observed, failed ones included
    pub fn write_attempts(&self) -> usize {
        *self.write_attempts.lock()
    }
}

impl HistoryBackend for MemoryBackend {
    fn read(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self.slot.lock().clone())
    }

    fn write(&self, payload: &str) -> Result<(), PersistenceError> {
        *self.write_attempts.lock() += 1;

        let scripted = self.scripted_failures.lock().pop();
        match scripted {
            Some(WriteFailure::Quota) => Err(PersistenceError::QuotaExceeded(
                "scripted quota failure".to_string(),
            )),
            Some(WriteFailure::Io) => Err(PersistenceError::Io("scripted io failure".to_string())),
            None => {
                *self.slot.lock() = Some(payload.to_string());
                Ok(())
            }
        }
    }

    fn quarantine(&self, payload: &str) -> Result<(), PersistenceError> {
        *self.quarantine_slot.lock() = Some(payload.to_string());
        Ok(())
    }
}
