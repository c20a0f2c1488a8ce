//! The process-wide DB manager.

use crate::config::{ManagerConfig, NewDbOptions};
use crate::db::Db;
use crate::error::{CoreError, CoreResult};
use crate::identity::Identity;
use crate::keyed::KeyedLocks;
use crate::schema::{DescriptorValidator, SchemaValidator};
use crate::thread_id::{ThreadId, Variant};
use crate::token::{Token, TokenAuthority};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use weftdb_logstore::LogStore;
use weftdb_net::{NetError, Network, ThreadOptions};

/// The single authoritative multiplexer over all open DBs in this process.
///
/// The manager owns the in-memory registry of open [`Db`]s, mediates all
/// creation, retrieval, and deletion, hydrates previously created DBs from
/// persisted log metadata, and issues identity tokens. It is the sole path
/// through which the network and log store are reached by callers.
///
/// # Concurrency
///
/// All operations are safe under concurrent invocation. Creation,
/// hydration, and deletion for one thread ID serialize with each other;
/// operations on distinct IDs proceed independently (per-ID locks, not one
/// global lock held across I/O).
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use weftdb_core::{Manager, ManagerConfig, NewDbOptions, ThreadId, Variant};
/// use weftdb_logstore::MemoryLogStore;
/// use weftdb_net::LoopbackNetwork;
///
/// let store = Arc::new(MemoryLogStore::new());
/// let network = Arc::new(LoopbackNetwork::new(store.clone()));
/// let manager = Manager::new(network, store, ManagerConfig::default()).unwrap();
///
/// let id = ThreadId::new(Variant::Raw, 32);
/// let db = manager.new_db(&id, NewDbOptions::new()).unwrap();
/// assert!(db.collection_names().is_empty());
/// ```
pub struct Manager {
    network: Arc<dyn Network>,
    log: Arc<dyn LogStore>,
    validator: Arc<dyn SchemaValidator>,
    authority: TokenAuthority,
    config: ManagerConfig,
    registry: RwLock<HashMap<ThreadId, Arc<Db>>>,
    locks: KeyedLocks<ThreadId>,
    open: AtomicBool,
}

impl Manager {
    /// Creates a manager over injected network and log store handles.
    pub fn new(
        network: Arc<dyn Network>,
        log: Arc<dyn LogStore>,
        config: ManagerConfig,
    ) -> CoreResult<Self> {
        let mut authority = match &config.token_secret {
            Some(secret) => TokenAuthority::new(secret.clone()),
            None => TokenAuthority::with_random_secret(),
        };
        if let Some(ttl) = config.token_ttl {
            authority = authority.with_ttl(ttl);
        }

        if config.debug {
            debug!("manager starting");
        }

        Ok(Self {
            network,
            log,
            validator: Arc::new(DescriptorValidator::new()),
            authority,
            config,
            registry: RwLock::new(HashMap::new()),
            locks: KeyedLocks::new(),
            open: AtomicBool::new(true),
        })
    }

    /// Replaces the schema validator applied to every DB this manager
    /// opens.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Mints a fresh raw-variant thread ID with the configured entropy
    /// length.
    #[must_use]
    pub fn new_thread_id(&self) -> ThreadId {
        ThreadId::new(Variant::Raw, self.config.entropy_len)
    }

    /// Creates a brand-new DB for the given thread ID.
    ///
    /// The thread is announced to the network and its metadata is durably
    /// recorded in the log store before this returns; a crash right after a
    /// successful return loses nothing. A successful creation is
    /// immediately visible to [`Manager::get_db`] from any caller.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyExists`] if the ID is already live or
    /// durably recorded. Network and store failures are surfaced without
    /// retry, and a failed creation leaves no partial registry or store
    /// state behind.
    pub fn new_db(&self, id: &ThreadId, opts: NewDbOptions) -> CoreResult<Arc<Db>> {
        self.ensure_open()?;
        let _guard = self.locks.acquire(id);
        self.ensure_open()?;

        if self.registry.read().contains_key(id) {
            return Err(CoreError::already_exists(id));
        }
        if self.log.contains(id.as_bytes())? {
            return Err(CoreError::already_exists(id));
        }

        let mut thread_opts = ThreadOptions::new();
        if let Some(token) = &opts.token {
            thread_opts = thread_opts.with_token(token.as_bytes().to_vec());
        }
        match self.network.create_thread(id.as_bytes(), &thread_opts) {
            Ok(()) => {}
            Err(NetError::ThreadExists) => return Err(CoreError::already_exists(id)),
            Err(e) => return Err(e.into()),
        }

        let db = match self.record_and_create(id) {
            Ok(db) => db,
            Err(e) => {
                // The thread was announced; roll it back so the failed call
                // leaves nothing behind. The original failure is what the
                // caller sees.
                let _ = self.network.delete_thread(id.as_bytes());
                let _ = self.log.delete(id.as_bytes());
                return Err(e);
            }
        };

        self.registry.write().insert(id.clone(), db.clone());
        if self.config.debug {
            debug!(thread = %id, "db created");
        }
        Ok(db)
    }

    /// Returns the DB for the given thread ID.
    ///
    /// A live registry entry is returned directly. On a miss the manager
    /// attempts hydration from persisted log metadata; concurrent calls for
    /// the same missing ID collapse to one hydration, and at most one DB
    /// object is ever installed per ID.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ThreadNotFound`] if the ID exists nowhere,
    /// neither in the registry nor the log store.
    pub fn get_db(&self, id: &ThreadId) -> CoreResult<Arc<Db>> {
        self.ensure_open()?;

        if let Some(db) = self.registry.read().get(id) {
            return Ok(db.clone());
        }

        let _guard = self.locks.acquire(id);
        self.ensure_open()?;

        // A concurrent hydration may have won while we waited for the lock
        if let Some(db) = self.registry.read().get(id) {
            return Ok(db.clone());
        }

        if !self.log.contains(id.as_bytes())? {
            return Err(CoreError::thread_not_found(id));
        }

        let db = Db::hydrate(id.clone(), self.log.clone(), self.validator.clone())?;
        self.registry.write().insert(id.clone(), db.clone());
        if self.config.debug {
            debug!(thread = %id, "db hydrated into registry");
        }
        Ok(db)
    }

    /// Permanently deletes the DB for the given thread ID.
    ///
    /// The live DB (if any) is closed, the network stops replicating the
    /// thread, and the log store erases its log and metadata outright.
    /// There is no tombstone: a second delete, or any later
    /// [`Manager::get_db`], fails [`CoreError::ThreadNotFound`].
    pub fn delete_db(&self, id: &ThreadId) -> CoreResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.acquire(id);
        self.ensure_open()?;

        let live = self.registry.read().get(id).cloned();
        if live.is_none() && !self.log.contains(id.as_bytes())? {
            return Err(CoreError::thread_not_found(id));
        }

        // The live DB is closed only once the external deletions have
        // succeeded; a failed delete leaves the DB usable.
        match self.network.delete_thread(id.as_bytes()) {
            // The replication layer may have never seen the thread
            Ok(()) | Err(NetError::ThreadNotFound) => {}
            Err(e) => return Err(e.into()),
        }

        match self.log.delete(id.as_bytes()) {
            Ok(()) | Err(weftdb_logstore::StoreError::ThreadNotFound) => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(db) = &live {
            db.close();
        }
        self.registry.write().remove(id);
        drop(_guard);
        self.locks.remove(id);

        if self.config.debug {
            info!(thread = %id, "db deleted");
        }
        Ok(())
    }

    /// Issues an identity token through the token authority.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AuthFailure`] if the identity cannot produce a
    /// valid signature over the authority's challenge.
    pub fn get_token(&self, identity: &Identity) -> CoreResult<Token> {
        self.ensure_open()?;
        self.authority.issue(identity)
    }

    /// Returns the token authority, for challenge round trips with remote
    /// callers and for verification.
    #[must_use]
    pub fn token_authority(&self) -> &TokenAuthority {
        &self.authority
    }

    /// Gracefully closes every open DB and releases the registry.
    ///
    /// Waits for in-flight lifecycle operations to finish, then closes each
    /// DB and flushes the log store. Durability of appended records is the
    /// log store's guarantee; the manager buffers nothing. Idempotent.
    pub fn close(&self) -> CoreResult<()> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        // Serialize with lifecycle operations still in flight
        for key in self.locks.keys() {
            let _guard = self.locks.acquire(&key);
        }

        let mut registry = self.registry.write();
        for db in registry.values() {
            db.close();
        }
        registry.clear();
        drop(registry);

        self.log.flush()?;
        if self.config.debug {
            info!("manager closed");
        }
        Ok(())
    }

    /// Returns whether the manager is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::ManagerClosed)
        }
    }

    /// Records a created thread durably and builds its DB.
    ///
    /// A loopback network registers the thread with the shared store; a
    /// remote transport does not, so the durable record is ensured either
    /// way. Any failure here must be rolled back by the caller, who still
    /// holds the announced network thread.
    fn record_and_create(&self, id: &ThreadId) -> CoreResult<Arc<Db>> {
        if !self.log.contains(id.as_bytes())? {
            self.log.register(id.as_bytes())?;
        }
        Db::create(id.clone(), self.log.clone(), self.validator.clone())
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("open_dbs", &self.registry.read().len())
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::thread;
    use weftdb_logstore::{MemoryLogStore, StoreError, StoreResult};
    use weftdb_net::{LoopbackNetwork, NetResult};

    /// A remote-style network: tracks announced threads on its own, never
    /// touching the log store, the way a real transport behaves.
    struct MockNetwork {
        threads: Mutex<Vec<Vec<u8>>>,
        fail_delete: AtomicBool,
    }

    impl MockNetwork {
        fn new() -> Self {
            Self {
                threads: Mutex::new(Vec::new()),
                fail_delete: AtomicBool::new(false),
            }
        }
    }

    impl Network for MockNetwork {
        fn create_thread(&self, thread: &[u8], _opts: &ThreadOptions) -> NetResult<()> {
            let mut threads = self.threads.lock();
            if threads.iter().any(|t| t == thread) {
                return Err(NetError::ThreadExists);
            }
            threads.push(thread.to_vec());
            Ok(())
        }

        fn delete_thread(&self, thread: &[u8]) -> NetResult<()> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(NetError::Store(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "link down",
                ))));
            }
            let mut threads = self.threads.lock();
            match threads.iter().position(|t| t == thread) {
                Some(i) => {
                    threads.remove(i);
                    Ok(())
                }
                None => Err(NetError::ThreadNotFound),
            }
        }

        fn threads(&self) -> NetResult<Vec<Vec<u8>>> {
            Ok(self.threads.lock().clone())
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn close(&self) -> NetResult<()> {
            Ok(())
        }
    }

    /// Delegates to an in-memory store but refuses every registration.
    struct RegisterFailStore(MemoryLogStore);

    impl LogStore for RegisterFailStore {
        fn register(&self, _thread: &[u8]) -> StoreResult<()> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }

        fn contains(&self, thread: &[u8]) -> StoreResult<bool> {
            self.0.contains(thread)
        }

        fn append(&self, thread: &[u8], record: &[u8]) -> StoreResult<u64> {
            self.0.append(thread, record)
        }

        fn read_range(&self, thread: &[u8], start: u64, max: usize) -> StoreResult<Vec<Vec<u8>>> {
            self.0.read_range(thread, start, max)
        }

        fn len(&self, thread: &[u8]) -> StoreResult<u64> {
            self.0.len(thread)
        }

        fn put_metadata(&self, thread: &[u8], metadata: &[u8]) -> StoreResult<()> {
            self.0.put_metadata(thread, metadata)
        }

        fn get_metadata(&self, thread: &[u8]) -> StoreResult<Option<Vec<u8>>> {
            self.0.get_metadata(thread)
        }

        fn delete(&self, thread: &[u8]) -> StoreResult<()> {
            self.0.delete(thread)
        }

        fn threads(&self) -> StoreResult<Vec<Vec<u8>>> {
            self.0.threads()
        }

        fn flush(&self) -> StoreResult<()> {
            self.0.flush()
        }
    }

    fn create_test_manager() -> Manager {
        let store = Arc::new(MemoryLogStore::new());
        let network = Arc::new(LoopbackNetwork::new(store.clone()));
        Manager::new(network, store, ManagerConfig::default().with_debug(true)).unwrap()
    }

    #[test]
    fn get_db_on_unknown_id_not_found() {
        let manager = create_test_manager();
        let id = ThreadId::new(Variant::Raw, 32);

        // Repeatedly, without side effects
        for _ in 0..3 {
            let result = manager.get_db(&id);
            assert!(matches!(result, Err(CoreError::ThreadNotFound { .. })));
        }
    }

    #[test]
    fn creation_immediately_visible() {
        let manager = create_test_manager();
        let id = ThreadId::new(Variant::Raw, 32);

        let created = manager.new_db(&id, NewDbOptions::new()).unwrap();
        assert!(created.collection_names().is_empty());

        let fetched = manager.get_db(&id).unwrap();
        assert!(Arc::ptr_eq(&created, &fetched));
    }

    #[test]
    fn duplicate_creation_rejected() {
        let manager = create_test_manager();
        let id = ThreadId::new(Variant::Raw, 32);

        let first = manager.new_db(&id, NewDbOptions::new()).unwrap();
        let second = manager.new_db(&id, NewDbOptions::new());
        assert!(matches!(second, Err(CoreError::AlreadyExists { .. })));

        // The first DB is unaffected
        assert!(first.is_open());
        assert!(Arc::ptr_eq(&first, &manager.get_db(&id).unwrap()));
    }

    #[test]
    fn deletion_is_final() {
        let manager = create_test_manager();
        let id = ThreadId::new(Variant::Raw, 32);

        manager.new_db(&id, NewDbOptions::new()).unwrap();
        manager.delete_db(&id).unwrap();

        assert!(matches!(
            manager.get_db(&id),
            Err(CoreError::ThreadNotFound { .. })
        ));
        assert!(matches!(
            manager.delete_db(&id),
            Err(CoreError::ThreadNotFound { .. })
        ));
    }

    #[test]
    fn stale_handle_after_delete_fails_not_found() {
        let manager = create_test_manager();
        let id = ThreadId::new(Variant::Raw, 32);

        let db = manager.new_db(&id, NewDbOptions::new()).unwrap();
        let collection = db
            .new_collection(crate::CollectionConfig::new(
                "Person",
                crate::Schema::from_value(serde_json::json!({"type": "object"})),
            ))
            .unwrap();

        manager.delete_db(&id).unwrap();

        // The cached handles are dead; closed DB wins over stale writes
        assert!(matches!(
            collection.create(br#"{}"#),
            Err(CoreError::DbClosed) | Err(CoreError::ThreadNotFound { .. })
        ));
    }

    #[test]
    fn concurrent_creation_single_winner() {
        let manager = Arc::new(create_test_manager());
        let id = ThreadId::new(Variant::Raw, 32);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                let id = id.clone();
                thread::spawn(move || manager.new_db(&id, NewDbOptions::new()).is_ok())
            })
            .collect();

        let wins: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(wins, 1);
        assert!(manager.get_db(&id).is_ok());
    }

    #[test]
    fn concurrent_get_db_installs_one_object() {
        let store = Arc::new(MemoryLogStore::new());
        let network = Arc::new(LoopbackNetwork::new(store.clone()));
        let id = ThreadId::new(Variant::Raw, 32);

        // Seed the store so both managers see a hydration candidate
        {
            let seeder = Manager::new(
                network.clone(),
                store.clone(),
                ManagerConfig::default(),
            )
            .unwrap();
            seeder.new_db(&id, NewDbOptions::new()).unwrap();
            // Drop without delete; the durable record stays
        }

        let manager = Arc::new(
            Manager::new(network, store, ManagerConfig::default()).unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                let id = id.clone();
                thread::spawn(move || manager.get_db(&id).unwrap())
            })
            .collect();

        let dbs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for db in &dbs[1..] {
            assert!(Arc::ptr_eq(&dbs[0], db));
        }
    }

    #[test]
    fn failed_store_registration_rolls_back_network_thread() {
        let network = Arc::new(MockNetwork::new());
        let store = Arc::new(RegisterFailStore(MemoryLogStore::new()));
        let manager = Manager::new(network.clone(), store, ManagerConfig::default()).unwrap();

        let id = ThreadId::new(Variant::Raw, 32);
        let result = manager.new_db(&id, NewDbOptions::new());
        assert!(matches!(result, Err(CoreError::Store(_))));

        // The announced thread was rolled back; nothing is left anywhere
        assert!(network.threads().unwrap().is_empty());
        assert!(matches!(
            manager.get_db(&id),
            Err(CoreError::ThreadNotFound { .. })
        ));
    }

    #[test]
    fn failed_external_delete_leaves_db_usable() {
        let store = Arc::new(MemoryLogStore::new());
        let network = Arc::new(MockNetwork::new());
        let manager = Manager::new(network.clone(), store, ManagerConfig::default()).unwrap();

        let id = ThreadId::new(Variant::Raw, 32);
        let db = manager.new_db(&id, NewDbOptions::new()).unwrap();

        network.fail_delete.store(true, Ordering::SeqCst);
        let result = manager.delete_db(&id);
        assert!(matches!(result, Err(CoreError::Network(_))));

        // The DB stays open and registered
        assert!(db.is_open());
        assert!(Arc::ptr_eq(&db, &manager.get_db(&id).unwrap()));

        // Once the network recovers, the delete goes through
        network.fail_delete.store(false, Ordering::SeqCst);
        manager.delete_db(&id).unwrap();
        assert!(!db.is_open());
        assert!(matches!(
            manager.get_db(&id),
            Err(CoreError::ThreadNotFound { .. })
        ));
    }

    #[test]
    fn distinct_ids_are_independent() {
        let manager = create_test_manager();
        let a = ThreadId::new(Variant::Raw, 32);
        let b = ThreadId::new(Variant::Raw, 32);

        let db_a = manager.new_db(&a, NewDbOptions::new()).unwrap();
        let db_b = manager.new_db(&b, NewDbOptions::new()).unwrap();
        assert!(!Arc::ptr_eq(&db_a, &db_b));

        manager.delete_db(&a).unwrap();
        assert!(manager.get_db(&b).is_ok());
    }

    #[test]
    fn closed_manager_rejects_everything() {
        let manager = create_test_manager();
        let id = ThreadId::new(Variant::Raw, 32);
        let db = manager.new_db(&id, NewDbOptions::new()).unwrap();

        manager.close().unwrap();
        manager.close().unwrap(); // idempotent

        assert!(!db.is_open());
        assert!(matches!(
            manager.new_db(&ThreadId::new(Variant::Raw, 32), NewDbOptions::new()),
            Err(CoreError::ManagerClosed)
        ));
        assert!(matches!(
            manager.get_db(&id),
            Err(CoreError::ManagerClosed)
        ));
        assert!(matches!(
            manager.delete_db(&id),
            Err(CoreError::ManagerClosed)
        ));
    }

    #[test]
    fn minted_ids_use_configured_entropy() {
        let store = Arc::new(MemoryLogStore::new());
        let network = Arc::new(LoopbackNetwork::new(store.clone()));
        let manager = Manager::new(
            network,
            store,
            ManagerConfig::default().with_entropy_len(24),
        )
        .unwrap();

        let id = manager.new_thread_id();
        assert_eq!(id.as_bytes().len(), 2 + 24);
    }
}
