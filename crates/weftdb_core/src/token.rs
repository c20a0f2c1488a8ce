//! Identity tokens and the authority that issues them.
//!
//! Tokens bind a caller's public identity to a validity window using
//! HMAC-SHA256. Issuance runs a challenge round trip: the authority picks a
//! random challenge, the identity signs it, and the authority only signs a
//! token after the signature verifies.
//!
//! ## Token Format
//!
//! - 32 bytes: identity public key
//! - 8 bytes: issued-at (Unix millis, big-endian)
//! - 8 bytes: expires-at (Unix millis, big-endian; `u64::MAX` = never)
//! - 32 bytes: HMAC-SHA256 over the first 48 bytes
//!
//! Total: 80 bytes, opaque to callers.

use crate::error::{CoreError, CoreResult};
use crate::identity::{Identity, PublicIdentity, PUBLIC_KEY_LEN, SIGNATURE_LEN};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Length of an issuance challenge in bytes.
pub const CHALLENGE_LEN: usize = 32;

/// Total token length in bytes.
pub const TOKEN_LEN: usize = PUBLIC_KEY_LEN + 8 + 8 + 32;

/// An opaque signed credential binding a caller to a cryptographic identity.
///
/// Tokens are bearer credentials: they carry no per-thread scope and
/// authorize the bearer to act as the embedded identity anywhere the
/// network's access checks apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(Vec<u8>);

impl Token {
    /// Wraps raw token bytes received from a caller.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the raw token bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns whether the token is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Stateless issuer and verifier of identity tokens.
///
/// The authority holds only an HMAC signing secret and a time-to-live; it
/// keeps no per-token state, so verification works on the token alone.
#[derive(Clone)]
pub struct TokenAuthority {
    secret: Vec<u8>,
    /// `None` means tokens never expire (local-process default).
    ttl: Option<Duration>,
}

impl TokenAuthority {
    /// Creates an authority with the given signing secret and no expiry.
    #[must_use]
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret, ttl: None }
    }

    /// Creates an authority with a random signing secret and no expiry.
    #[must_use]
    pub fn with_random_secret() -> Self {
        let mut secret = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(secret)
    }

    /// Sets the token time-to-live.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Picks a random challenge for an issuance round trip.
    #[must_use]
    pub fn challenge(&self) -> [u8; CHALLENGE_LEN] {
        let mut challenge = [0u8; CHALLENGE_LEN];
        rand::thread_rng().fill_bytes(&mut challenge);
        challenge
    }

    /// Issues a token after verifying the identity's signature over a
    /// challenge previously produced by [`TokenAuthority::challenge`].
    ///
    /// This is the entry point for remote callers, who sign the challenge
    /// on their side of the wire.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AuthFailure`] if the signature does not verify
    /// against the public identity.
    pub fn issue_with_signature(
        &self,
        public: &PublicIdentity,
        challenge: &[u8; CHALLENGE_LEN],
        signature: &[u8; SIGNATURE_LEN],
    ) -> CoreResult<Token> {
        if !public.verify(challenge, signature) {
            return Err(CoreError::AuthFailure);
        }

        let issued_at = now_millis();
        let expires_at = match self.ttl {
            Some(ttl) => issued_at.saturating_add(ttl.as_millis() as u64),
            None => u64::MAX,
        };

        let mut data = Vec::with_capacity(TOKEN_LEN);
        data.extend_from_slice(&public.to_bytes());
        data.extend_from_slice(&issued_at.to_be_bytes());
        data.extend_from_slice(&expires_at.to_be_bytes());

        let signature = self.sign(&data);
        data.extend_from_slice(&signature);
        Ok(Token(data))
    }

    /// Issues a token for a local identity, running the challenge round
    /// trip in-process.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AuthFailure`] if the identity cannot produce a
    /// valid signature.
    pub fn issue(&self, identity: &Identity) -> CoreResult<Token> {
        let challenge = self.challenge();
        let signature = identity.sign(&challenge);
        self.issue_with_signature(&identity.public(), &challenge, &signature)
    }

    /// Verifies a token and resolves the identity it was issued to.
    ///
    /// Checks the HMAC and the expiry on the token itself; no fresh
    /// challenge is involved.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TokenInvalid`] on a malformed token or bad
    /// signature, [`CoreError::TokenExpired`] past the validity window.
    pub fn verify(&self, token: &Token) -> CoreResult<PublicIdentity> {
        let bytes = token.as_bytes();
        if bytes.len() != TOKEN_LEN {
            return Err(CoreError::TokenInvalid);
        }

        let expected = self.sign(&bytes[..48]);
        if bytes[48..] != expected {
            return Err(CoreError::TokenInvalid);
        }

        let mut expires_buf = [0u8; 8];
        expires_buf.copy_from_slice(&bytes[40..48]);
        let expires_at = u64::from_be_bytes(expires_buf);
        if now_millis() > expires_at {
            return Err(CoreError::TokenExpired);
        }

        let mut key_buf = [0u8; PUBLIC_KEY_LEN];
        key_buf.copy_from_slice(&bytes[..PUBLIC_KEY_LEN]);
        PublicIdentity::from_bytes(&key_buf).map_err(|_| CoreError::TokenInvalid)
    }

    /// Signs data with HMAC-SHA256.
    fn sign(&self, data: &[u8]) -> [u8; 32] {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
