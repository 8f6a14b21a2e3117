/*!
 * Exactly-once persistence of job outcomes.
 *
 * Multiple call sites can try to record the same outcome: the diff
 * cache's automatic side effect and any manual save path. The
 * coordinator closes that race with one async gate per outcome key,
 * held across the whole check-then-write window.
 */

use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::history::HistoryStore;
use crate::job::JobRecord;

/// Serializes outcome persistence per duplicate-detection key
pub struct SaveCoordinator {
    store: Arc<HistoryStore>,
    /// One gate per in-flight outcome key
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SaveCoordinator {
    /// Create a coordinator writing to the given store
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self {
            store,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// The store this coordinator writes to
    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    /// Record one outcome at most once.
    ///
    /// Returns whether this call persisted the record. Concurrent calls
    /// with the same key serialize on the key's gate; exactly one of
    /// them can come back `true`. Calls with different keys proceed
    /// independently.
    pub async fn record_outcome(&self, record: JobRecord) -> bool {
        let key = record.outcome_key();
        let gate = self.gate_for(&key);

        let persisted = {
            let _held = gate.lock().await;
            // No await between the check and the append, so the pair
            // cannot be split by cancellation
            if self.store.contains_outcome(&key) {
                debug!("Outcome already recorded: {}", key);
                false
            } else {
                self.store.append(record)
            }
        };

        drop(gate);
        self.prune(&key);
        persisted
    }

    /// Number of gates currently tracked
    pub fn gate_count(&self) -> usize {
        self.gates.lock().len()
    }

    fn gate_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.gates
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop a gate once no caller holds it, keeping the table bounded
    /// to in-flight keys
    fn prune(&self, key: &str) {
        let mut gates = self.gates.lock();
        if gates.get(key).is_some_and(|gate| Arc::strong_count(gate) == 1) {
            gates.remove(key);
        }
    }
}
