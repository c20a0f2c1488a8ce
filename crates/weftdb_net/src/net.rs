//! Network trait definition.

use crate::error::NetResult;

/// Options presented to the network when creating a thread.
///
/// The token, when present, is an opaque credential issued by the manager's
/// token authority; the network's access policy decides whether to honor it.
#[derive(Debug, Clone, Default)]
pub struct ThreadOptions {
    /// Bearer token identifying the caller, if any.
    pub token: Option<Vec<u8>>,
}

impl ThreadOptions {
    /// Creates empty options (process-default identity).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a bearer token to the options.
    #[must_use]
    pub fn with_token(mut self, token: Vec<u8>) -> Self {
        self.token = Some(token);
        self
    }
}

/// Access-control hook applied to identity-scoped network operations.
///
/// Implementations decide whether a presented token authorizes the caller.
/// The default policy is open (every call is allowed).
pub trait AccessPolicy: Send + Sync {
    /// Returns whether the token authorizes the operation.
    fn authorize(&self, token: Option<&[u8]>) -> bool;
}

/// The replication boundary WeftDB's manager drives.
///
/// A network propagates a thread's log records among the peers holding the
/// same thread. The real peer-to-peer transport lives outside this
/// repository; the manager only needs thread creation/deletion, enumeration
/// of known threads, and graceful shutdown.
///
/// Thread keys are opaque bytes at this layer, matching the log store.
pub trait Network: Send + Sync {
    /// Announces a new thread to the replication layer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NetError::ThreadExists`] if the thread is already
    /// known, or [`crate::NetError::NotAuthorized`] if the access policy
    /// rejects the presented token.
    fn create_thread(&self, thread: &[u8], opts: &ThreadOptions) -> NetResult<()>;

    /// Stops replicating a thread and forgets it.
    fn delete_thread(&self, thread: &[u8]) -> NetResult<()>;

    /// Enumerates the thread keys known to this peer.
    fn threads(&self) -> NetResult<Vec<Vec<u8>>>;

    /// Returns whether the network handle is usable.
    fn is_connected(&self) -> bool;

    /// Closes the network handle. Subsequent operations fail
    /// [`crate::NetError::NotConnected`].
    fn close(&self) -> NetResult<()>;
}
