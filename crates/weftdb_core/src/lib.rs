//! # WeftDB Core
//!
//! The management layer of WeftDB: a multiplexer over many independent,
//! content-addressed document databases, each bound to a single replicated
//! append-only log (a *thread*).
//!
//! The [`Manager`] is the entry point. It owns the registry of open
//! [`Db`]s, hydrates previously created DBs from durable log metadata,
//! mediates creation and irreversible deletion, and issues identity
//! [`Token`]s through its [`TokenAuthority`]. Each DB holds named,
//! schema-validated [`Collection`]s whose documents are appended to the
//! thread's log as CBOR records.
//!
//! Storage and replication are injected: the manager drives a
//! [`weftdb_logstore::LogStore`] for durability and a
//! [`weftdb_net::Network`] for replication, and never reaches around them.
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use weftdb_core::{CollectionConfig, Manager, ManagerConfig, NewDbOptions, Schema};
//! use weftdb_logstore::MemoryLogStore;
//! use weftdb_net::LoopbackNetwork;
//!
//! let store = Arc::new(MemoryLogStore::new());
//! let network = Arc::new(LoopbackNetwork::new(store.clone()));
//! let manager = Manager::new(network, store, ManagerConfig::default())?;
//!
//! let id = manager.new_thread_id();
//! let db = manager.new_db(&id, NewDbOptions::new())?;
//! let people = db.new_collection(CollectionConfig::new(
//!     "Person",
//!     Schema::from_value(json!({
//!         "type": "object",
//!         "properties": {"name": {"type": "string"}},
//!     })),
//! ))?;
//! let id = people.create(br#"{"name": "ada"}"#)?;
//! assert!(people.get(&id)?.is_some());
//! # Ok::<(), weftdb_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod db;
mod error;
mod identity;
mod keyed;
mod manager;
mod record;
mod schema;
mod thread_id;
mod token;

pub use collection::{Collection, CollectionConfig, ID_FIELD};
pub use config::{ManagerConfig, NewDbOptions};
pub use db::Db;
pub use error::{CoreError, CoreResult};
pub use identity::{Identity, PublicIdentity, PUBLIC_KEY_LEN, SIGNATURE_LEN};
pub use manager::Manager;
pub use record::LogRecord;
pub use schema::{DescriptorValidator, Schema, SchemaValidator, Violation};
pub use thread_id::{ThreadId, Variant, DEFAULT_ENTROPY_LEN, MIN_ENTROPY_LEN};
pub use token::{Token, TokenAuthority, CHALLENGE_LEN, TOKEN_LEN};
