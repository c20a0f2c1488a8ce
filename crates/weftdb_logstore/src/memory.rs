//! In-memory log store for testing.

use crate::error::{StoreError, StoreResult};
use crate::store::LogStore;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Per-thread state held by the in-memory store.
#[derive(Debug, Default)]
struct ThreadSlot {
    records: Vec<Vec<u8>>,
    metadata: Option<Vec<u8>>,
}

/// An in-memory log store.
///
/// This store keeps all threads in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral databases that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use weftdb_logstore::{LogStore, MemoryLogStore};
///
/// let store = MemoryLogStore::new();
/// store.register(b"thread-a").unwrap();
/// let seq = store.append(b"thread-a", b"record").unwrap();
/// assert_eq!(seq, 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    threads: RwLock<HashMap<Vec<u8>, ThreadSlot>>,
}

impl MemoryLogStore {
    /// Creates a new empty in-memory log store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for MemoryLogStore {
    fn register(&self, thread: &[u8]) -> StoreResult<()> {
        let mut threads = self.threads.write();
        if threads.contains_key(thread) {
            return Err(StoreError::ThreadExists);
        }
        threads.insert(thread.to_vec(), ThreadSlot::default());
        Ok(())
    }

    fn contains(&self, thread: &[u8]) -> StoreResult<bool> {
        Ok(self.threads.read().contains_key(thread))
    }

    fn append(&self, thread: &[u8], record: &[u8]) -> StoreResult<u64> {
        let mut threads = self.threads.write();
        let slot = threads.get_mut(thread).ok_or(StoreError::ThreadNotFound)?;
        let seq = slot.records.len() as u64;
        slot.records.push(record.to_vec());
        Ok(seq)
    }

    fn read_range(&self, thread: &[u8], start: u64, max: usize) -> StoreResult<Vec<Vec<u8>>> {
        let threads = self.threads.read();
        let slot = threads.get(thread).ok_or(StoreError::ThreadNotFound)?;
        let start = start.min(slot.records.len() as u64) as usize;
        let end = start.saturating_add(max).min(slot.records.len());
        Ok(slot.records[start..end].to_vec())
    }

    fn len(&self, thread: &[u8]) -> StoreResult<u64> {
        let threads = self.threads.read();
        let slot = threads.get(thread).ok_or(StoreError::ThreadNotFound)?;
        Ok(slot.records.len() as u64)
    }

    fn put_metadata(&self, thread: &[u8], metadata: &[u8]) -> StoreResult<()> {
        let mut threads = self.threads.write();
        let slot = threads.get_mut(thread).ok_or(StoreError::ThreadNotFound)?;
        slot.metadata = Some(metadata.to_vec());
        Ok(())
    }

    fn get_metadata(&self, thread: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let threads = self.threads.read();
        let slot = threads.get(thread).ok_or(StoreError::ThreadNotFound)?;
        Ok(slot.metadata.clone())
    }

    fn delete(&self, thread: &[u8]) -> StoreResult<()> {
        let mut threads = self.threads.write();
        if threads.remove(thread).is_none() {
            return Err(StoreError::ThreadNotFound);
        }
        Ok(())
    }

    fn threads(&self) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self.threads.read().keys().cloned().collect())
    }

    fn flush(&self) -> StoreResult<()> {
        // Nothing pending for an in-memory store
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_append() {
        let store = MemoryLogStore::new();
        store.register(b"t1").unwrap();

        assert_eq!(store.append(b"t1", b"a").unwrap(), 0);
        assert_eq!(store.append(b"t1", b"b").unwrap(), 1);
        assert_eq!(store.len(b"t1").unwrap(), 2);
    }

    #[test]
    fn duplicate_register_rejected() {
        let store = MemoryLogStore::new();
        store.register(b"t1").unwrap();
        assert!(matches!(
            store.register(b"t1"),
            Err(StoreError::ThreadExists)
        ));
    }

    #[test]
    fn read_range_in_order() {
        let store = MemoryLogStore::new();
        store.register(b"t1").unwrap();
        for i in 0..5u8 {
            store.append(b"t1", &[i]).unwrap();
        }

        let records = store.read_range(b"t1", 1, 3).unwrap();
        assert_eq!(records, vec![vec![1], vec![2], vec![3]]);

        // Past the end is empty, not an error
        assert!(store.read_range(b"t1", 10, 3).unwrap().is_empty());
    }

    #[test]
    fn metadata_roundtrip() {
        let store = MemoryLogStore::new();
        store.register(b"t1").unwrap();

        assert!(store.get_metadata(b"t1").unwrap().is_none());
        store.put_metadata(b"t1", b"meta").unwrap();
        assert_eq!(store.get_metadata(b"t1").unwrap(), Some(b"meta".to_vec()));
    }

    #[test]
    fn delete_erases_everything() {
        let store = MemoryLogStore::new();
        store.register(b"t1").unwrap();
        store.append(b"t1", b"a").unwrap();
        store.put_metadata(b"t1", b"meta").unwrap();

        store.delete(b"t1").unwrap();
        assert!(!store.contains(b"t1").unwrap());
        assert!(matches!(store.len(b"t1"), Err(StoreError::ThreadNotFound)));
        assert!(matches!(
            store.delete(b"t1"),
            Err(StoreError::ThreadNotFound)
        ));
    }

    #[test]
    fn unknown_thread_not_found() {
        let store = MemoryLogStore::new();
        assert!(matches!(
            store.append(b"nope", b"a"),
            Err(StoreError::ThreadNotFound)
        ));
        assert!(matches!(
            store.get_metadata(b"nope"),
            Err(StoreError::ThreadNotFound)
        ));
    }

    #[test]
    fn thread_enumeration() {
        let store = MemoryLogStore::new();
        store.register(b"t1").unwrap();
        store.register(b"t2").unwrap();

        let mut threads = store.threads().unwrap();
        threads.sort();
        assert_eq!(threads, vec![b"t1".to_vec(), b"t2".to_vec()]);
    }
}
