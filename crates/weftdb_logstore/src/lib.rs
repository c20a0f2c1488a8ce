//! # WeftDB Log Store
//!
//! Durable, append-only log and metadata storage keyed by thread.
//!
//! This crate provides the lowest-level storage abstraction for WeftDB.
//! Thread keys, records, and metadata are **opaque byte blobs** - the store
//! does not interpret the data it holds.
//!
//! ## Design Principles
//!
//! - Stores are simple per-thread byte logs (register, append, read, delete)
//! - No knowledge of WeftDB record formats, schemas, or thread semantics
//! - Must be `Send + Sync` for concurrent access
//! - `weftdb_core` owns all format interpretation
//!
//! ## Available Stores
//!
//! - [`MemoryLogStore`] - for testing and ephemeral deployments
//! - [`FileLogStore`] - for persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use weftdb_logstore::{LogStore, MemoryLogStore};
//!
//! let store = MemoryLogStore::new();
//! store.register(b"thread-a").unwrap();
//! store.append(b"thread-a", b"hello world").unwrap();
//! let records = store.read_range(b"thread-a", 0, 10).unwrap();
//! assert_eq!(records[0], b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileLogStore;
pub use memory::MemoryLogStore;
pub use store::LogStore;
