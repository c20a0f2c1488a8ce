//! Error types for log store operations.

use std::io;
use thiserror::Error;

/// Result type for log store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during log store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The thread is not present in the store.
    ///
    /// This is the distinguished "not found" condition: it signals domain
    /// absence, not a transport or storage failure.
    #[error("thread not found in log store")]
    ThreadNotFound,

    /// The thread is already present in the store.
    #[error("thread already exists in log store")]
    ThreadExists,

    /// A log or metadata file is corrupted.
    #[error("log store corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the repository lock.
    #[error("repository locked: another process has exclusive access")]
    RepoLocked,
}
