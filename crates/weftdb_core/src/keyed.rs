//! Per-key mutual exclusion.

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// A guard holding one key's lock.
pub(crate) type KeyGuard = ArcMutexGuard<RawMutex, ()>;

/// A map of independent per-key mutexes.
///
/// Lifecycle operations for one thread ID must serialize with each other,
/// but operations on distinct IDs must not contend. `KeyedLocks` gives each
/// key its own mutex; the table itself is only locked long enough to find
/// or insert the slot, never across I/O.
#[derive(Debug, Default)]
pub(crate) struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires the lock for `key`, blocking until it is free.
    pub(crate) fn acquire(&self, key: &K) -> KeyGuard {
        let slot = {
            let mut slots = self.slots.lock();
            slots.entry(key.clone()).or_default().clone()
        };
        slot.lock_arc()
    }

    /// Drops the slot for `key` if no guard is held and no waiter is
    /// queued on it. A contended slot stays so waiters keep excluding each
    /// other; it is reclaimed by a later `remove`.
    pub(crate) fn remove(&self, key: &K) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            if Arc::strong_count(slot) == 1 {
                slots.remove(key);
            }
        }
    }

    /// Returns the currently known keys.
    pub(crate) fn keys(&self) -> Vec<K> {
        self.slots.lock().keys().cloned().collect()
    }
}
