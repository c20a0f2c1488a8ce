//! Durable log record format.
//!
//! Every collection mutation becomes one CBOR-encoded record appended to
//! the DB's thread log, and log records replay back into collection state.
//! A whole `CreateMany` batch is a single record, which is what makes batch
//! creation all-or-nothing at the log layer.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record in a thread's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogRecord {
    /// A single document created in a collection.
    Create {
        /// Collection name.
        collection: String,
        /// The document, `_id` already assigned.
        doc: Value,
    },
    /// A batch of documents created atomically in a collection.
    CreateMany {
        /// Collection name.
        collection: String,
        /// The documents, `_id`s already assigned.
        docs: Vec<Value>,
    },
    /// A document replaced in place. Recognized by the decoder for forward
    /// compatibility; not yet produced by collections.
    Update {
        /// Collection name.
        collection: String,
        /// Instance ID of the document.
        id: String,
        /// The replacement document.
        doc: Value,
    },
    /// A document removed. Recognized by the decoder for forward
    /// compatibility; not yet produced by collections.
    Delete {
        /// Collection name.
        collection: String,
        /// Instance ID of the document.
        id: String,
    },
}

impl LogRecord {
    /// Returns the name of the collection the record belongs to.
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            LogRecord::Create { collection, .. }
            | LogRecord::CreateMany { collection, .. }
            | LogRecord::Update { collection, .. }
            | LogRecord::Delete { collection, .. } => collection,
        }
    }

    /// Encodes the record to CBOR.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::codec(format!("record encode: {e}")))?;
        Ok(buf)
    }

    /// Decodes a record from CBOR.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::codec(format!("record decode: {e}")))
    }
}
