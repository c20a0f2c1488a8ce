//! In-process loopback network.

use crate::error::{NetError, NetResult};
use crate::net::{AccessPolicy, Network, ThreadOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use weftdb_logstore::{LogStore, StoreError};

/// A network implementation that replicates nowhere.
///
/// `LoopbackNetwork` fulfills the [`Network`] contract against a shared log
/// store without any peers: thread creation registers the thread with the
/// store, enumeration lists the store's threads, and deletion simply stops
/// tracking (erasure of log data is the log store's job, driven by the
/// manager).
///
/// Used by single-process deployments and by tests; a real peer-to-peer
/// transport implements the same trait.
pub struct LoopbackNetwork {
    store: Arc<dyn LogStore>,
    policy: Option<Arc<dyn AccessPolicy>>,
    connected: AtomicBool,
}

impl LoopbackNetwork {
    /// Creates a loopback network over the given log store with an open
    /// access policy.
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self {
            store,
            policy: None,
            connected: AtomicBool::new(true),
        }
    }

    /// Sets the access policy applied to identity-scoped operations.
    #[must_use]
    pub fn with_access_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    fn ensure_connected(&self) -> NetResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(NetError::NotConnected)
        }
    }

    fn authorize(&self, token: Option<&[u8]>) -> NetResult<()> {
        if let Some(policy) = &self.policy {
            if !policy.authorize(token) {
                return Err(NetError::NotAuthorized("token rejected".into()));
            }
        }
        Ok(())
    }
}

impl Network for LoopbackNetwork {
    fn create_thread(&self, thread: &[u8], opts: &ThreadOptions) -> NetResult<()> {
        self.ensure_connected()?;
        self.authorize(opts.token.as_deref())?;

        match self.store.register(thread) {
            Ok(()) => {
                debug!(key_len = thread.len(), "loopback thread created");
                Ok(())
            }
            Err(StoreError::ThreadExists) => Err(NetError::ThreadExists),
            Err(e) => Err(NetError::Store(e)),
        }
    }

    fn delete_thread(&self, thread: &[u8]) -> NetResult<()> {
        self.ensure_connected()?;
        // Nothing replicated, nothing to tear down; existence is still
        // checked so callers get a proper not-found.
        match self.store.contains(thread) {
            Ok(true) => Ok(()),
            Ok(false) => Err(NetError::ThreadNotFound),
            Err(e) => Err(NetError::Store(e)),
        }
    }

    fn threads(&self) -> NetResult<Vec<Vec<u8>>> {
        self.ensure_connected()?;
        Ok(self.store.threads()?)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> NetResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
