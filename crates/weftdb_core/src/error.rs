//! Error types for WeftDB core.

use crate::schema::Violation;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in WeftDB core operations.
///
/// Domain errors (an operation that is conceptually invalid) are distinct
/// variants from surfaced [`CoreError::Store`] / [`CoreError::Network`] I/O
/// failures, so callers can tell "don't bother retrying" from "retry might
/// help".
#[derive(Debug, Error)]
pub enum CoreError {
    /// Log store failure surfaced to the caller.
    #[error("log store error: {0}")]
    Store(#[from] weftdb_logstore::StoreError),

    /// Network failure surfaced to the caller.
    #[error("network error: {0}")]
    Network(#[from] weftdb_net::NetError),

    /// A DB already exists for the thread ID, live or durably recorded.
    #[error("db already exists: {id}")]
    AlreadyExists {
        /// The thread ID that collided.
        id: String,
    },

    /// No DB exists for the thread ID, neither live nor recorded.
    #[error("thread not found: {id}")]
    ThreadNotFound {
        /// The thread ID that was looked up.
        id: String,
    },

    /// A collection with this name is already registered in the DB.
    #[error("collection already registered: {name}")]
    AlreadyRegistered {
        /// Name of the colliding collection.
        name: String,
    },

    /// A document failed its collection's schema.
    #[error("schema validation failed: {}", format_violations(.violations))]
    SchemaValidation {
        /// The violations found, with field paths.
        violations: Vec<Violation>,
    },

    /// A document is not valid JSON.
    #[error("invalid document: {message}")]
    InvalidDocument {
        /// Description of the parse failure.
        message: String,
    },

    /// A thread ID could not be decoded.
    #[error("invalid thread id: {message}")]
    InvalidThreadId {
        /// Description of the decoding failure.
        message: String,
    },

    /// The identity could not prove possession of its signing key.
    #[error("authentication failed: bad challenge signature")]
    AuthFailure,

    /// The token's validity window has passed.
    #[error("token expired")]
    TokenExpired,

    /// The token is malformed or its signature does not verify.
    #[error("token invalid")]
    TokenInvalid,

    /// A record or metadata blob could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// The manager has been closed.
    #[error("manager is closed")]
    ManagerClosed,

    /// The DB has been closed.
    #[error("db is closed")]
    DbClosed,
}

impl CoreError {
    /// Creates an `AlreadyExists` error for a thread ID.
    pub fn already_exists(id: impl ToString) -> Self {
        Self::AlreadyExists { id: id.to_string() }
    }

    /// Creates a `ThreadNotFound` error for a thread ID.
    pub fn thread_not_found(id: impl ToString) -> Self {
        Self::ThreadNotFound { id: id.to_string() }
    }

    /// Creates an `AlreadyRegistered` error for a collection name.
    pub fn already_registered(name: impl Into<String>) -> Self {
        Self::AlreadyRegistered { name: name.into() }
    }

    /// Creates an `InvalidDocument` error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Creates an `InvalidThreadId` error.
    pub fn invalid_thread_id(message: impl Into<String>) -> Self {
        Self::InvalidThreadId {
            message: message.into(),
        }
    }

    /// Creates a `Codec` error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
