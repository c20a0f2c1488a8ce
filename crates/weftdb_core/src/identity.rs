//! Cryptographic identities.

use crate::error::{CoreError, CoreResult};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;

/// Length of a public identity encoding in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of a challenge signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// A principal's signing identity: an Ed25519 keypair.
///
/// An identity proves possession of its private half by signing challenges
/// chosen by the token authority.
pub struct Identity {
    signing: SigningKey,
}

impl Identity {
    /// Generates a fresh identity from the OS random number generator.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Reconstructs an identity from its 32-byte secret seed.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// Signs a message with the identity's private key.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.signing.sign(message).to_bytes()
    }

    /// Returns the public half of the identity.
    #[must_use]
    pub fn public(&self) -> PublicIdentity {
        PublicIdentity(self.signing.verifying_key())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the private half
        write!(f, "Identity({})", self.public())
    }
}

/// The public, shareable half of an [`Identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicIdentity(VerifyingKey);

impl PublicIdentity {
    /// Decodes a public identity from its 32-byte canonical encoding.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AuthFailure`] if the bytes are not a valid
    /// Ed25519 public key.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LEN]) -> CoreResult<Self> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| CoreError::AuthFailure)
    }

    /// Returns the 32-byte canonical encoding.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0.to_bytes()
    }

    /// Verifies a signature over a message.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_LEN]) -> bool {
        let signature = Signature::from_bytes(signature);
        self.0.verify(message, &signature).is_ok()
    }
}

impl fmt::Display for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.to_bytes() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
