//! Schema-validated document collections.

use crate::error::{CoreError, CoreResult};
use crate::record::LogRecord;
use crate::schema::{Schema, SchemaValidator};
use crate::thread_id::ThreadId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;
use weftdb_logstore::{LogStore, StoreError};

/// Field that carries a document's instance ID.
pub const ID_FIELD: &str = "_id";

/// Number of records fetched per replay batch.
const REPLAY_BATCH: usize = 256;

/// Configuration for registering a collection.
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Collection name, unique within its DB.
    pub name: String,
    /// Schema applied to every document write. Fixed at registration.
    pub schema: Schema,
}

impl CollectionConfig {
    /// Creates a collection configuration.
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// A named set of schema-validated documents inside a DB.
///
/// Collections are cheap to clone; all clones share the same underlying
/// state. Every write validates against the collection's schema before a
/// record is appended to the thread's log, and reads replay the log back
/// into document state.
#[derive(Clone)]
pub struct Collection {
    name: Arc<str>,
    schema: Arc<Schema>,
    validator: Arc<dyn SchemaValidator>,
    thread_id: ThreadId,
    log: Arc<dyn LogStore>,
    db_open: Arc<AtomicBool>,
}

impl Collection {
    pub(crate) fn new(
        name: String,
        schema: Schema,
        validator: Arc<dyn SchemaValidator>,
        thread_id: ThreadId,
        log: Arc<dyn LogStore>,
        db_open: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name: name.into(),
            schema: Arc::new(schema),
            validator,
            thread_id,
            log,
            db_open,
        }
    }

    /// Returns the collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the collection's schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Creates a document from its JSON bytes.
    ///
    /// A missing or empty `_id` is assigned a fresh UUID before validation.
    /// Returns the document's instance ID.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidDocument`] if the bytes are not a JSON object
    /// - [`CoreError::SchemaValidation`] if the document fails the schema;
    ///   nothing is appended
    /// - [`CoreError::ThreadNotFound`] if the DB was concurrently deleted
    pub fn create(&self, doc: &[u8]) -> CoreResult<String> {
        self.ensure_open()?;
        let (id, doc) = self.prepare(doc)?;

        let record = LogRecord::Create {
            collection: self.name.to_string(),
            doc,
        };
        self.append(&record)?;
        Ok(id)
    }

    /// Creates a batch of documents atomically.
    ///
    /// Every document is validated before anything is appended; one
    /// violation fails the whole batch with nothing applied. On success the
    /// batch goes into a single log record.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::create`], raised for the first offending
    /// document.
    pub fn create_many(&self, docs: &[Vec<u8>]) -> CoreResult<Vec<String>> {
        self.ensure_open()?;

        let mut ids = Vec::with_capacity(docs.len());
        let mut prepared = Vec::with_capacity(docs.len());
        for doc in docs {
            let (id, doc) = self.prepare(doc)?;
            ids.push(id);
            prepared.push(doc);
        }

        if prepared.is_empty() {
            return Ok(ids);
        }

        let record = LogRecord::CreateMany {
            collection: self.name.to_string(),
            docs: prepared,
        };
        self.append(&record)?;
        Ok(ids)
    }

    /// Returns a document by instance ID, or `None` if it does not exist.
    pub fn get(&self, id: &str) -> CoreResult<Option<Value>> {
        Ok(self.replay()?.remove(id))
    }

    /// Returns the number of documents in the collection.
    pub fn count(&self) -> CoreResult<usize> {
        Ok(self.replay()?.len())
    }

    /// Parses, assigns an instance ID, and validates one document.
    fn prepare(&self, doc: &[u8]) -> CoreResult<(String, Value)> {
        let mut value: Value = serde_json::from_slice(doc)
            .map_err(|e| CoreError::invalid_document(e.to_string()))?;

        let object = value
            .as_object_mut()
            .ok_or_else(|| CoreError::invalid_document("document must be a JSON object"))?;

        let id = match object.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = Uuid::new_v4().to_string();
                object.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };

        self.validator
            .validate(&self.schema, &value)
            .map_err(|violations| CoreError::SchemaValidation { violations })?;

        Ok((id, value))
    }

    fn append(&self, record: &LogRecord) -> CoreResult<()> {
        let bytes = record.encode()?;
        self.log
            .append(self.thread_id.as_bytes(), &bytes)
            .map_err(|e| self.map_store_err(e))?;
        Ok(())
    }

    /// Replays the thread's log into this collection's document state.
    ///
    /// Committed documents are trusted; nothing is re-validated here.
    fn replay(&self) -> CoreResult<HashMap<String, Value>> {
        self.ensure_open()?;

        let mut state = HashMap::new();
        let mut next = 0u64;
        loop {
            let batch = self
                .log
                .read_range(self.thread_id.as_bytes(), next, REPLAY_BATCH)
                .map_err(|e| self.map_store_err(e))?;
            if batch.is_empty() {
                break;
            }
            next += batch.len() as u64;

            for bytes in &batch {
                let record = LogRecord::decode(bytes)?;
                if record.collection() != self.name.as_ref() {
                    continue;
                }
                match record {
                    LogRecord::Create { doc, .. } => {
                        insert_doc(&mut state, doc);
                    }
                    LogRecord::CreateMany { docs, .. } => {
                        for doc in docs {
                            insert_doc(&mut state, doc);
                        }
                    }
                    LogRecord::Update { id, doc, .. } => {
                        state.insert(id, doc);
                    }
                    LogRecord::Delete { id, .. } => {
                        state.remove(&id);
                    }
                }
            }
        }
        Ok(state)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.db_open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::DbClosed)
        }
    }

    fn map_store_err(&self, e: StoreError) -> CoreError {
        match e {
            StoreError::ThreadNotFound => CoreError::thread_not_found(&self.thread_id),
            other => CoreError::Store(other),
        }
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}

fn insert_doc(state: &mut HashMap<String, Value>, doc: Value) {
    if let Some(id) = doc.get(ID_FIELD).and_then(Value::as_str) {
        state.insert(id.to_string(), doc);
    }
}
