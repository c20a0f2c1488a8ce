//! Thread identifiers.

use crate::error::{CoreError, CoreResult};
use rand::RngCore;
use std::fmt;
use std::str::FromStr;

/// Encoding version for thread IDs.
const ID_VERSION: u8 = 0x01;

/// Default entropy length in bytes for new thread IDs.
pub const DEFAULT_ENTROPY_LEN: usize = 32;

/// Minimum accepted entropy length in bytes.
pub const MIN_ENTROPY_LEN: usize = 16;

/// Thread variant tag.
///
/// The variant is part of the ID itself, so a thread's access discipline is
/// self-describing and immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variant {
    /// Plain thread with no embedded access control.
    Raw,
    /// Thread whose records are gated by identity-based access control.
    AccessControlled,
}

impl Variant {
    const fn tag(self) -> u8 {
        match self {
            Variant::Raw => 0x55,
            Variant::AccessControlled => 0x70,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x55 => Some(Variant::Raw),
            0x70 => Some(Variant::AccessControlled),
            _ => None,
        }
    }
}

/// Globally unique identifier for one replicated log / logical database.
///
/// A thread ID is a version byte, a variant tag, and random entropy of a
/// configurable length. It is immutable once created and is the sole key
/// for a DB in both the log store and the manager's registry.
///
/// # Example
///
/// ```rust
/// use weftdb_core::{ThreadId, Variant};
///
/// let id = ThreadId::new(Variant::Raw, 32);
/// let parsed: ThreadId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(Vec<u8>);

impl ThreadId {
    /// Creates a new random thread ID.
    ///
    /// `entropy_len` below [`MIN_ENTROPY_LEN`] is clamped up to it.
    #[must_use]
    pub fn new(variant: Variant, entropy_len: usize) -> Self {
        let entropy_len = entropy_len.max(MIN_ENTROPY_LEN);
        let mut bytes = vec![0u8; 2 + entropy_len];
        bytes[0] = ID_VERSION;
        bytes[1] = variant.tag();
        rand::thread_rng().fill_bytes(&mut bytes[2..]);
        Self(bytes)
    }

    /// Decodes a thread ID from its byte encoding.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidThreadId`] on a bad version, unknown
    /// variant tag, or insufficient entropy.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < 2 + MIN_ENTROPY_LEN {
            return Err(CoreError::invalid_thread_id(format!(
                "too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[0] != ID_VERSION {
            return Err(CoreError::invalid_thread_id(format!(
                "unsupported version: {:#04x}",
                bytes[0]
            )));
        }
        if Variant::from_tag(bytes[1]).is_none() {
            return Err(CoreError::invalid_thread_id(format!(
                "unknown variant tag: {:#04x}",
                bytes[1]
            )));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Returns the byte encoding of the ID.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the ID's variant.
    #[must_use]
    pub fn variant(&self) -> Variant {
        // Validated at construction
        Variant::from_tag(self.0[1]).unwrap_or(Variant::Raw)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadId({self})")
    }
}

impl FromStr for ThreadId {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        if s.len() % 2 != 0 {
            return Err(CoreError::invalid_thread_id("odd-length hex string"));
        }
        let bytes: Option<Vec<u8>> = (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
            .collect();
        let bytes = bytes.ok_or_else(|| CoreError::invalid_thread_id("not a hex string"))?;
        Self::from_bytes(&bytes)
    }
}
