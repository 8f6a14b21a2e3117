/*!
 * Incremental-update cache for rendered batch items.
 *
 * The cache remembers a fingerprint of every item it has seen so a
 * renderer only touches items that actually changed between polls. It
 * also owns the one-time side effect: the first time an item is seen
 * in a terminal status, its outcome goes to the save coordinator, and
 * never again for the life of the cache entry.
 */

use log::debug;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::BatchItem;
use crate::tracking::batch::{BatchContext, ItemDelta};
use crate::tracking::save_coordinator::SaveCoordinator;

/// Cache key combining the batch identity and the item position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    batch_id: String,
    index: usize,
}

/// Last observed state of one item
struct CacheEntry {
    /// Fingerprint of the fields a renderer shows
    snapshot: String,
    /// Whether the terminal outcome was already handed to the coordinator
    side_effect_done: bool,
}

/// Per-item snapshot cache scoped to the currently tracked batch
pub struct DiffCache {
    saver: Arc<SaveCoordinator>,
    entries: Mutex<HashMap<EntryKey, CacheEntry>>,
}

impl DiffCache {
    /// Create a cache recording outcomes through the given coordinator
    pub fn new(saver: Arc<SaveCoordinator>) -> Self {
        Self {
            saver,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fold a poll round into the cache.
    ///
    /// Returns one delta per item, in batch order, with `changed` set
    /// for items whose visible fields differ from the previous round.
    /// Items observed in a terminal status for the first time have
    /// their outcome recorded before this call returns.
    pub async fn update(&self, ctx: &BatchContext, items: &[BatchItem]) -> Vec<ItemDelta> {
        let mut deltas = Vec::with_capacity(items.len());
        let mut newly_terminal = Vec::new();

        {
            let mut entries = self.entries.lock();
            for (index, item) in items.iter().enumerate() {
                let key = EntryKey {
                    batch_id: ctx.batch_id.clone(),
                    index,
                };
                let snapshot = Self::fingerprint(item);
                let entry = entries.entry(key).or_insert_with(|| CacheEntry {
                    snapshot: String::new(),
                    side_effect_done: false,
                });

                let changed = entry.snapshot != snapshot;
                entry.snapshot = snapshot;

                if item.status.is_terminal() && !entry.side_effect_done {
                    entry.side_effect_done = true;
                    newly_terminal.push(index);
                }

                deltas.push(ItemDelta {
                    index,
                    changed,
                    item: item.clone(),
                });
            }
        }

        // Side effects run outside the lock, in item order
        for index in newly_terminal {
            let record = ctx.record_for(index, &items[index]);
            if !self.saver.record_outcome(record).await {
                debug!(
                    "Outcome for item {} of batch {} was already recorded",
                    index, ctx.batch_id
                );
            }
        }

        deltas
    }

    /// Forget everything. Called when a new batch starts so memory
    /// stays bounded to the current batch's item count.
    pub fn reset(&self) {
        let mut entries = self.entries.lock();
        if !entries.is_empty() {
            debug!("Clearing {} cached item snapshot(s)", entries.len());
        }
        entries.clear();
    }

    /// Number of cached item snapshots
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no snapshots
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Fingerprint of the fields a renderer shows for an item
    fn fingerprint(item: &BatchItem) -> String {
        let mut hasher = Sha256::new();
        hasher.update(item.name.as_bytes());
        hasher.update([0]);
        hasher.update(item.status.to_string().as_bytes());
        hasher.update([0]);
        if let Some(progress) = item.progress {
            hasher.update(progress.to_le_bytes());
        }
        hasher.update([0]);
        if let Some(error) = &item.error {
            hasher.update(error.as_bytes());
        }
        hasher.update([0]);
        if let Some(primary) = item.result.as_ref().and_then(|r| r.primary()) {
            hasher.update(primary.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}
