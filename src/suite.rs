use crate::canonical;
use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use serde_json::Value;
use signature::{Signer as _, Verifier as _};

/// The algorithm identifier used when signing compact tokens.
pub const EDDSA: &str = "EdDSA";

/// The suite identifier used when signing linked-data proofs.
pub const ED25519_SIGNATURE_2018: &str = "Ed25519Signature2018";

/// A pluggable signature suite.
///
/// A suite owns a private key and knows how to produce signatures and a deterministic byte
/// form of a document. Verification is deliberately not part of this capability: it only
/// needs public key material and is dispatched generically through an [AlgorithmRegistry],
/// keeping signing and verifying cleanly separated.
pub trait SignatureSuite {
    /// The identifier for this suite's algorithm, e.g. "EdDSA" or "Ed25519Signature2018".
    fn algorithm_id(&self) -> &str;

    /// Sign the given payload.
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SigningError>;

    /// Produce the deterministic byte form of a document.
    ///
    /// The output is stable under map iteration order and is the exact signing and
    /// verification input for in-document proofs.
    fn canonicalize(&self, document: &Value) -> Result<Vec<u8>, SigningError> {
        canonical::canonical_json(document).map_err(|e| SigningError::Canonicalization(e.to_string()))
    }
}

/// An error that can occur when signing.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("canonicalization failed: {0}")]
    Canonicalization(String),
}

/// A signature suite backed by a local Ed25519 key.
///
/// The same key can sign under two suite identities: [EDDSA] for compact tokens and
/// [ED25519_SIGNATURE_2018] for linked-data proofs.
#[derive(Clone)]
pub struct Ed25519Suite {
    signing_key: SigningKey,
    algorithm: &'static str,
}

impl Ed25519Suite {
    /// Create a suite that identifies itself as `EdDSA`.
    pub fn eddsa(signing_key: SigningKey) -> Self {
        Self { signing_key, algorithm: EDDSA }
    }

    /// Create a suite that identifies itself as `Ed25519Signature2018`.
    pub fn signature_2018(signing_key: SigningKey) -> Self {
        Self { signing_key, algorithm: ED25519_SIGNATURE_2018 }
    }
}

impl SignatureSuite for Ed25519Suite {
    fn algorithm_id(&self) -> &str {
        self.algorithm
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SigningError> {
        let signature: Signature =
            self.signing_key.try_sign(payload).map_err(|e| SigningError::SigningFailed(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

/// A supported signature algorithm family.
///
/// A family verifies signatures using resolved public key material only; it holds no keys
/// itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Algorithm {
    Ed25519,
}

impl Algorithm {
    /// Verify a signature over the given message.
    pub fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), SignatureInvalidError> {
        match self {
            Self::Ed25519 => {
                let public_key: [u8; 32] =
                    public_key.try_into().map_err(|_| SignatureInvalidError::PublicKey)?;
                let verifying_key =
                    VerifyingKey::from_bytes(&public_key).map_err(|_| SignatureInvalidError::PublicKey)?;
                let signature =
                    Signature::from_slice(signature).map_err(|_| SignatureInvalidError::Signature)?;
                verifying_key.verify(message, &signature).map_err(|_| SignatureInvalidError::Signature)
            }
        }
    }
}

/// An error during the verification of a signature.
#[derive(Debug, thiserror::Error)]
pub enum SignatureInvalidError {
    #[error("invalid public key")]
    PublicKey,

    #[error("invalid signature")]
    Signature,
}

/// A registry mapping algorithm and suite identifiers to algorithm families.
///
/// The registry is passed explicitly into decode and verify calls; there is no ambient
/// global registration.
#[derive(Clone, Debug)]
pub struct AlgorithmRegistry {
    entries: Vec<(String, Algorithm)>,
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(EDDSA, Algorithm::Ed25519);
        registry.register(ED25519_SIGNATURE_2018, Algorithm::Ed25519);
        registry
    }
}

impl AlgorithmRegistry {
    /// Construct a registry with no registered identifiers.
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Register an identifier for the given algorithm family.
    pub fn register<T: Into<String>>(&mut self, id: T, algorithm: Algorithm) {
        self.entries.push((id.into(), algorithm));
    }

    /// Look up the algorithm family for an identifier.
    pub fn resolve(&self, id: &str) -> Result<Algorithm, UnsupportedAlgorithmError> {
        self.entries
            .iter()
            .find(|(name, _)| name == id)
            .map(|(_, algorithm)| *algorithm)
            .ok_or_else(|| UnsupportedAlgorithmError(id.into()))
    }
}

/// An error raised for an unregistered algorithm identifier.
#[derive(Debug, thiserror::Error)]
#[error("unsupported algorithm: '{0}'")]
pub struct UnsupportedAlgorithmError(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::Keypair;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::eddsa(EDDSA)]
    #[case::signature_2018(ED25519_SIGNATURE_2018)]
    fn sign_and_verify_through_registry(#[case] algorithm: &str) {
        let keypair = Keypair::generate();
        let suite: Ed25519Suite = match algorithm {
            EDDSA => keypair.jwt_suite(),
            _ => keypair.linked_data_suite(),
        };
        assert_eq!(suite.algorithm_id(), algorithm);

        let message = b"payload to sign";
        let signature = suite.sign(message).expect("signing failed");

        let registry = AlgorithmRegistry::default();
        let family = registry.resolve(algorithm).expect("resolve failed");
        family.verify(&keypair.public_key(), message, &signature).expect("verification failed");
    }

    #[test]
    fn wrong_key_fails_verification() {
        let keypair = Keypair::generate();
        let other = Keypair::generate();
        let signature = keypair.jwt_suite().sign(b"message").expect("signing failed");

        let err = Algorithm::Ed25519
            .verify(&other.public_key(), b"message", &signature)
            .expect_err("verification succeeded");
        assert!(matches!(err, SignatureInvalidError::Signature));
    }

    #[test]
    fn malformed_key_material_is_rejected() {
        let err = Algorithm::Ed25519.verify(&[0xaa; 7], b"message", &[0; 64]).expect_err("verification succeeded");
        assert!(matches!(err, SignatureInvalidError::PublicKey));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let registry = AlgorithmRegistry::default();
        registry.resolve("ES256K").expect_err("resolve succeeded");
    }

    #[test]
    fn canonicalization_is_map_order_insensitive() {
        let keypair = Keypair::generate();
        let suite = keypair.linked_data_suite();
        let left = suite.canonicalize(&json!({"a": 1, "b": 2})).expect("canonicalize failed");
        let right = suite.canonicalize(&json!({"b": 2, "a": 1})).expect("canonicalize failed");
        assert_eq!(left, right);
    }
}
