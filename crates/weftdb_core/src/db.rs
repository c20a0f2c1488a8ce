//! A single logical database bound to one thread.

use crate::collection::{Collection, CollectionConfig};
use crate::error::{CoreError, CoreResult};
use crate::schema::{Schema, SchemaValidator};
use crate::thread_id::ThreadId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use weftdb_logstore::{LogStore, StoreError};

/// Durable DB-level metadata: the collection registry.
///
/// Persisted to the log store so hydration after a restart rebuilds every
/// collection without the caller re-supplying schemas.
#[derive(Debug, Default, Serialize, Deserialize)]
struct DbMeta {
    collections: Vec<CollectionMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CollectionMeta {
    name: String,
    schema: Schema,
}

impl DbMeta {
    fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::codec(format!("db metadata encode: {e}")))?;
        Ok(buf)
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        ciborium::from_reader(bytes)
            .map_err(|e| CoreError::codec(format!("db metadata decode: {e}")))
    }
}

/// One logical database bound to exactly one thread ID.
///
/// A `Db` owns a registry of named, schema-validated [`Collection`]s and
/// translates collection mutations into log records. At most one live `Db`
/// exists per thread ID per process; the [`crate::Manager`] enforces that
/// single-ownership.
pub struct Db {
    thread_id: ThreadId,
    log: Arc<dyn LogStore>,
    validator: Arc<dyn SchemaValidator>,
    collections: RwLock<HashMap<String, Collection>>,
    open: Arc<AtomicBool>,
}

impl Db {
    /// Constructs a brand-new, empty DB and persists its (empty) collection
    /// registry.
    pub(crate) fn create(
        thread_id: ThreadId,
        log: Arc<dyn LogStore>,
        validator: Arc<dyn SchemaValidator>,
    ) -> CoreResult<Arc<Self>> {
        let db = Self {
            thread_id,
            log,
            validator,
            collections: RwLock::new(HashMap::new()),
            open: Arc::new(AtomicBool::new(true)),
        };
        db.persist_meta(&db.collections.read())?;
        Ok(Arc::new(db))
    }

    /// Reconstructs a DB from persisted metadata after a registry miss.
    ///
    /// Collection registrations are replayed from the metadata blob;
    /// committed documents are trusted and not re-validated.
    pub(crate) fn hydrate(
        thread_id: ThreadId,
        log: Arc<dyn LogStore>,
        validator: Arc<dyn SchemaValidator>,
    ) -> CoreResult<Arc<Self>> {
        let meta = match log
            .get_metadata(thread_id.as_bytes())
            .map_err(|e| map_store_err(&thread_id, e))?
        {
            Some(bytes) => DbMeta::decode(&bytes)?,
            None => DbMeta::default(),
        };

        let open = Arc::new(AtomicBool::new(true));
        let mut collections = HashMap::with_capacity(meta.collections.len());
        for spec in meta.collections {
            let collection = Collection::new(
                spec.name.clone(),
                spec.schema,
                validator.clone(),
                thread_id.clone(),
                log.clone(),
                open.clone(),
            );
            collections.insert(spec.name, collection);
        }

        debug!(thread = %thread_id, collections = collections.len(), "db hydrated");

        Ok(Arc::new(Self {
            thread_id,
            log,
            validator,
            collections: RwLock::new(collections),
            open,
        }))
    }

    /// Returns the thread ID this DB is bound to.
    #[must_use]
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// Registers a new collection.
    ///
    /// The schema is fixed at registration and persisted durably before this
    /// returns, so a restart hydrates the collection without re-supplying
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyRegistered`] if the name exists in this
    /// DB.
    pub fn new_collection(&self, config: CollectionConfig) -> CoreResult<Collection> {
        self.ensure_open()?;

        let mut collections = self.collections.write();
        if collections.contains_key(&config.name) {
            return Err(CoreError::already_registered(config.name));
        }

        let collection = Collection::new(
            config.name.clone(),
            config.schema,
            self.validator.clone(),
            self.thread_id.clone(),
            self.log.clone(),
            self.open.clone(),
        );
        collections.insert(config.name.clone(), collection.clone());

        // Durable before visible: a failed persist rolls the entry back
        if let Err(e) = self.persist_meta(&collections) {
            collections.remove(&config.name);
            return Err(e);
        }
        Ok(collection)
    }

    /// Returns the collection with the given name, if registered.
    ///
    /// Absence is not an error; it distinguishes "no such collection" from
    /// storage failures.
    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Collection> {
        self.collections.read().get(name).cloned()
    }

    /// Returns the names of all registered collections.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Closes the DB. Idempotent; subsequent operations on the DB or its
    /// collections fail [`CoreError::DbClosed`].
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Returns whether the DB is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::DbClosed)
        }
    }

    fn persist_meta(&self, collections: &HashMap<String, Collection>) -> CoreResult<()> {
        let mut specs: Vec<CollectionMeta> = collections
            .values()
            .map(|c| CollectionMeta {
                name: c.name().to_string(),
                schema: c.schema().clone(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));

        let meta = DbMeta { collections: specs };
        self.log
            .put_metadata(self.thread_id.as_bytes(), &meta.encode()?)
            .map_err(|e| map_store_err(&self.thread_id, e))
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("thread_id", &self.thread_id)
            .field("collections", &self.collection_names())
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

fn map_store_err(thread_id: &ThreadId, e: StoreError) -> CoreError {
    match e {
        StoreError::ThreadNotFound => CoreError::thread_not_found(thread_id),
        other => CoreError::Store(other),
    }
}
