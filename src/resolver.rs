use std::collections::BTreeMap;

/// A resolver that maps an issuer or key identifier to public key material.
///
/// Resolution may involve network or storage I/O; this crate treats it as opaque, issues one
/// call per verification, and never retries internally. Implementations must be safe to call
/// concurrently from multiple verification operations.
pub trait KeyResolver {
    /// Fetch the public key material for the given issuer or key identifier.
    fn fetch(&self, id: &str) -> Result<Vec<u8>, KeyResolutionError>;
}

/// An error during public key resolution.
#[derive(Debug, thiserror::Error)]
pub enum KeyResolutionError {
    #[error("no public key found for '{0}'")]
    NotFound(String),

    #[error("key resolution failed: {0}")]
    ResolutionFailed(String),
}

/// A resolver that returns the same public key for every identifier.
#[derive(Clone, Debug)]
pub struct SingleKey {
    key: Vec<u8>,
}

impl SingleKey {
    /// Construct a resolver around one fixed public key.
    pub fn new<T: Into<Vec<u8>>>(key: T) -> Self {
        Self { key: key.into() }
    }
}

impl KeyResolver for SingleKey {
    fn fetch(&self, _id: &str) -> Result<Vec<u8>, KeyResolutionError> {
        Ok(self.key.clone())
    }
}

/// A resolver backed by an in-memory map of identifier to public key.
#[derive(Clone, Debug, Default)]
pub struct KeyRing {
    keys: BTreeMap<String, Vec<u8>>,
}

impl KeyRing {
    /// Construct an empty key ring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a public key under the given identifier.
    pub fn insert<I, K>(&mut self, id: I, key: K)
    where
        I: Into<String>,
        K: Into<Vec<u8>>,
    {
        self.keys.insert(id.into(), key.into());
    }
}

impl KeyResolver for KeyRing {
    fn fetch(&self, id: &str) -> Result<Vec<u8>, KeyResolutionError> {
        self.keys.get(id).cloned().ok_or_else(|| KeyResolutionError::NotFound(id.into()))
    }
}
