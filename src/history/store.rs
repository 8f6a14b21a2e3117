/*!
 * The capped, durable history of job outcomes.
 *
 * The store keeps the whole history as one JSON document in a backend
 * slot. Every operation is a full read-modify-write under a store-wide
 * lock, so the document on disk is always internally consistent. The
 * store never propagates read-side failures: a slot that stopped
 * decoding is quarantined and the history restarts empty.
 */

use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::{CorruptionError, PersistenceError};
use crate::history::backend::HistoryBackend;
use crate::job::JobRecord;

/// Most records the history keeps in steady state
pub const HISTORY_CAPACITY: usize = 50;

/// Records kept after the slot reports an out-of-space condition
pub const QUOTA_FALLBACK_CAPACITY: usize = 25;

/// Snapshot produced by [`HistoryStore::export_snapshot`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryExport {
    /// When the snapshot was taken (RFC 3339)
    pub exported_at: String,
    /// Number of records in the snapshot
    pub count: usize,
    /// The records, most recent first
    pub records: Vec<JobRecord>,
}

/// Decode a history blob, mapping decoder failures to a corruption error
fn decode_history(payload: &str) -> Result<Vec<JobRecord>, CorruptionError> {
    serde_json::from_str(payload).map_err(|e| CorruptionError::new(e.to_string()))
}

fn short(id: &str) -> &str {
    &id[..id.len().min(8)]
}

/// Store for recorded job outcomes, most recent first
pub struct HistoryStore {
    backend: Arc<dyn HistoryBackend>,
    /// Serializes every read-modify-write against the slot
    guard: Mutex<()>,
}

impl HistoryStore {
    /// Create a store over the given backend
    pub fn new(backend: Arc<dyn HistoryBackend>) -> Self {
        Self {
            backend,
            guard: Mutex::new(()),
        }
    }

    /// Load every record. Never fails: an empty slot yields an empty
    /// list, an undecodable one is quarantined and yields an empty list.
    pub fn load(&self) -> Vec<JobRecord> {
        let _guard = self.guard.lock();
        self.load_unlocked()
    }

    /// Append a record at the head, evicting past the capacity.
    ///
    /// Returns whether the record is now durably part of the history.
    /// Malformed records, records the history already holds, and
    /// persist failures all come back `false`.
    pub fn append(&self, mut record: JobRecord) -> bool {
        let _guard = self.guard.lock();

        if !record.is_well_formed() {
            warn!(
                "Discarding history record without a name or timestamp (source {:?})",
                record.source_ref
            );
            return false;
        }
        if record.id.trim().is_empty() {
            record.id = Uuid::new_v4().to_string();
        }

        let mut records = self.load_unlocked();
        let duplicate = records.iter().any(|existing| {
            existing.source_ref == record.source_ref && existing.created_at == record.created_at
        });
        if duplicate {
            debug!(
                "History already holds {} at {}",
                record.source_ref, record.created_at
            );
            return false;
        }

        debug!(
            "Recording outcome {} for {} ({})",
            short(&record.id),
            record.name,
            record.status
        );
        records.insert(0, record);
        records.truncate(HISTORY_CAPACITY);

        match self.persist_unlocked(&mut records) {
            Ok(()) => true,
            Err(err) => {
                warn!("History append not persisted: {}", err);
                false
            }
        }
    }

    /// Delete the record at `index`. Out-of-range indexes are logged
    /// and ignored. Returns whether a record was removed.
    pub fn delete(&self, index: usize) -> bool {
        let _guard = self.guard.lock();

        let mut records = self.load_unlocked();
        if index >= records.len() {
            warn!(
                "Ignoring delete of history index {} ({} records)",
                index,
                records.len()
            );
            return false;
        }

        let removed = records.remove(index);
        debug!("Deleting history record {} ({})", short(&removed.id), removed.name);

        if let Err(err) = self.persist_unlocked(&mut records) {
            warn!("History delete not persisted: {}", err);
        }
        true
    }

    /// Take a read-only snapshot of the history. Works whether or not
    /// the last persist succeeded.
    pub fn export_snapshot(&self) -> HistoryExport {
        let _guard = self.guard.lock();
        let records = self.load_unlocked();
        HistoryExport {
            exported_at: chrono::Utc::now().to_rfc3339(),
            count: records.len(),
            records,
        }
    }

    /// Whether any stored record carries this outcome key
    pub fn contains_outcome(&self, key: &str) -> bool {
        let _guard = self.guard.lock();
        self.load_unlocked()
            .iter()
            .any(|record| record.outcome_key() == key)
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.load().len()
    }

    /// Whether the history holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load_unlocked(&self) -> Vec<JobRecord> {
        match self.backend.read() {
            Ok(None) => Vec::new(),
            Ok(Some(payload)) => match decode_history(&payload) {
                Ok(records) => records,
                Err(err) => {
                    warn!("{}; moving the blob aside and starting over", err);
                    if let Err(qe) = self.backend.quarantine(&payload) {
                        warn!("Could not quarantine the corrupt history: {}", qe);
                    }
                    if let Err(we) = self.backend.write("[]") {
                        warn!("Could not clear the corrupt history slot: {}", we);
                    }
                    Vec::new()
                }
            },
            Err(err) => {
                warn!("Could not read history: {}", err);
                Vec::new()
            }
        }
    }

    /// Serialize and write the list. An out-of-space failure trims the
    /// list to the fallback capacity and retries exactly once; the
    /// retry's verdict is final either way.
    fn persist_unlocked(&self, records: &mut Vec<JobRecord>) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(records)
            .map_err(|e| PersistenceError::Serialize(e.to_string()))?;

        match self.backend.write(&payload) {
            Ok(()) => Ok(()),
            Err(err) if err.is_quota() => {
                warn!(
                    "History slot is full, keeping the {} most recent records",
                    QUOTA_FALLBACK_CAPACITY
                );
                records.truncate(QUOTA_FALLBACK_CAPACITY);
                let trimmed = serde_json::to_string(records)
                    .map_err(|e| PersistenceError::Serialize(e.to_string()))?;
                self.backend.write(&trimmed)
            }
            Err(err) => Err(err),
        }
    }
}
