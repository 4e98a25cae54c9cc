use crate::suite::Ed25519Suite;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::fmt;

/// An abstraction over an Ed25519 key pair.
///
/// This provides a unified API for creating the signature suites used by the compact token
/// codec and the linked-data proof embedder. Key storage is a collaborator concern; this
/// type only wraps key material handed to it.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new, random `Keypair`.
    pub fn generate() -> Self {
        Self { signing_key: SigningKey::generate(&mut OsRng) }
    }

    /// Create a `Keypair` from a 32-byte secret key seed.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self { signing_key: SigningKey::from_bytes(bytes) }
    }

    /// The raw 32-byte public key.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Create a suite for signing compact tokens (`EdDSA`).
    pub fn jwt_suite(&self) -> Ed25519Suite {
        Ed25519Suite::eddsa(self.signing_key.clone())
    }

    /// Create a suite for signing linked-data proofs (`Ed25519Signature2018`).
    pub fn linked_data_suite(&self) -> Ed25519Suite {
        Ed25519Suite::signature_2018(self.signing_key.clone())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair(<private>)")
    }
}
