//! Log store trait definition.

use crate::error::StoreResult;

/// Durable, append-only storage for thread logs and metadata.
///
/// A log store holds any number of independent threads, each keyed by an
/// opaque byte key. Per thread it keeps an ordered sequence of **records**
/// (opaque byte blobs, totally ordered by a 0-based sequence number) and a
/// single **metadata** blob. The store does not interpret keys, records, or
/// metadata - `weftdb_core` owns all interpretation.
///
/// # Invariants
///
/// - `append` assigns consecutive sequence numbers starting at 0; a record
///   is never lost, reordered, or duplicated
/// - data returned by `read_range` is exactly what was appended
/// - after `append` or `put_metadata` returns, the data survives process
///   termination (for persistent implementations)
/// - `delete` erases both log and metadata permanently
/// - implementations must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryLogStore`] - for testing and ephemeral deployments
/// - [`super::FileLogStore`] - for persistent storage
pub trait LogStore: Send + Sync {
    /// Registers a new, empty thread in the store.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::ThreadExists`] if the thread is already
    /// registered.
    fn register(&self, thread: &[u8]) -> StoreResult<()>;

    /// Returns whether the thread is present in the store.
    fn contains(&self, thread: &[u8]) -> StoreResult<bool>;

    /// Appends a record to the thread's log.
    ///
    /// Returns the sequence number assigned to the record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::ThreadNotFound`] if the thread is not
    /// registered, or an I/O error.
    fn append(&self, thread: &[u8], record: &[u8]) -> StoreResult<u64>;

    /// Reads up to `max` records starting at sequence number `start`.
    ///
    /// Records are returned in sequence order. Reading past the end of the
    /// log returns fewer (possibly zero) records, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::ThreadNotFound`] if the thread is not
    /// registered.
    fn read_range(&self, thread: &[u8], start: u64, max: usize) -> StoreResult<Vec<Vec<u8>>>;

    /// Returns the number of records in the thread's log.
    fn len(&self, thread: &[u8]) -> StoreResult<u64>;

    /// Stores the thread's metadata blob, replacing any previous value.
    fn put_metadata(&self, thread: &[u8], metadata: &[u8]) -> StoreResult<()>;

    /// Returns the thread's metadata blob, or `None` if none was stored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::ThreadNotFound`] if the thread is not
    /// registered.
    fn get_metadata(&self, thread: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Permanently erases the thread's log and metadata.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::ThreadNotFound`] if the thread is not
    /// registered.
    fn delete(&self, thread: &[u8]) -> StoreResult<()>;

    /// Enumerates the keys of all registered threads.
    fn threads(&self) -> StoreResult<Vec<Vec<u8>>>;

    /// Flushes pending writes to durable storage.
    fn flush(&self) -> StoreResult<()>;
}
