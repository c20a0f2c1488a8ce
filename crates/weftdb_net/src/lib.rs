//! # WeftDB Network
//!
//! The replication boundary WeftDB's manager drives.
//!
//! This crate defines the [`Network`] trait - thread creation/deletion,
//! enumeration of known threads, identity-scoped access hooks, and graceful
//! shutdown - plus [`LoopbackNetwork`], an in-process implementation used by
//! single-process deployments and tests. The actual peer-to-peer transport
//! and CRDT head merging live outside this repository behind the same trait.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod loopback;
mod net;

pub use error::{NetError, NetResult};
pub use loopback::LoopbackNetwork;
pub use net::{AccessPolicy, Network, ThreadOptions};
