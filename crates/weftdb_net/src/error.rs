//! Error types for the network boundary.

use thiserror::Error;

/// Result type for network operations.
pub type NetResult<T> = Result<T, NetError>;

/// Errors that can occur at the replication boundary.
#[derive(Debug, Error)]
pub enum NetError {
    /// The thread is already known to this peer.
    #[error("thread already exists on this peer")]
    ThreadExists,

    /// The thread is not known to this peer.
    #[error("thread not found on this peer")]
    ThreadNotFound,

    /// The presented token was rejected by the access policy.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The network handle has been closed.
    #[error("network is not connected")]
    NotConnected,

    /// Underlying log store failure.
    #[error("log store error: {0}")]
    Store(#[from] weftdb_logstore::StoreError),
}

impl NetError {
    /// Returns true if the error signals an invalid operation rather than a
    /// transient transport/storage failure.
    pub fn is_domain_error(&self) -> bool {
        matches!(
            self,
            NetError::ThreadExists | NetError::ThreadNotFound | NetError::NotAuthorized(_)
        )
    }
}
