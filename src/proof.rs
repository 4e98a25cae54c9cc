use crate::{
    credential::{timestamp, Credential, SchemaValidationError},
    jwt::{from_base64, to_base64},
    resolver::{KeyResolutionError, KeyResolver},
    suite::{AlgorithmRegistry, SignatureInvalidError, SignatureSuite, SigningError, UnsupportedAlgorithmError},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A proof attached to a credential document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    /// The timestamp at which this proof was created.
    #[serde(with = "timestamp")]
    pub created: DateTime<Utc>,

    /// The suite identifier that produced this proof.
    #[serde(rename = "type")]
    pub suite_type: String,

    /// The URI of the verification method for this proof.
    #[serde(rename = "verificationMethod")]
    pub verification_method: String,

    /// The signature payload, in its representation-specific form.
    #[serde(flatten)]
    pub value: ProofValue,
}

/// The representation-specific payload of a proof.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ProofValue {
    /// A detached signature token: `base64url(header) + ".." + base64url(signature)`.
    #[serde(rename = "jws")]
    DetachedJws(String),

    /// A directly embedded signature: `base64url(signature)`.
    #[serde(rename = "proofValue")]
    Embedded(String),
}

/// How a proof's signature is represented in the document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SignatureRepresentation {
    /// The signature bytes are embedded directly as `proofValue`.
    Embedded,

    /// The signature is a detached token under `jws`; the payload is referenced, not
    /// embedded.
    DetachedJws,
}

/// The context for attaching a proof to a credential.
pub struct LinkedDataProofContext<'a> {
    /// The suite that signs the document.
    pub suite: &'a dyn SignatureSuite,

    /// The URI of the verification method to record in the proof.
    pub verification_method: String,

    /// How the signature is represented.
    pub representation: SignatureRepresentation,

    /// The proof creation timestamp; mandatory.
    pub created: Option<DateTime<Utc>>,
}

// The unsigned header of a detached signature token.
#[derive(Serialize, Deserialize)]
struct DetachedHeader {
    alg: String,
    b64: bool,
    crit: Vec<String>,
}

impl DetachedHeader {
    fn new(algorithm: &str) -> Self {
        Self { alg: algorithm.into(), b64: false, crit: vec!["b64".into()] }
    }
}

impl Credential {
    /// Attach a proof to this credential.
    ///
    /// The signature never covers existing proofs: the signing input is the canonical form
    /// of the document with `proofs` cleared. Prior proofs are untouched, so multiple
    /// independent signatures over the same logical document can coexist.
    pub fn add_proof(&mut self, context: &LinkedDataProofContext<'_>) -> Result<(), AddProofError> {
        let created = context.created.ok_or(AddProofError::MissingCreated)?;
        self.validate()?;

        let document = signing_document(self)?;
        let document_bytes = context.suite.canonicalize(&document)?;

        let value = match context.representation {
            SignatureRepresentation::Embedded => {
                let signature = context.suite.sign(&document_bytes)?;
                ProofValue::Embedded(to_base64(signature))
            }
            SignatureRepresentation::DetachedJws => {
                let header = DetachedHeader::new(context.suite.algorithm_id());
                let header_b64 =
                    to_base64(serde_json::to_vec(&header).map_err(AddProofError::Document)?);
                let input = detached_signing_input(&header_b64, &document_bytes);
                let signature = context.suite.sign(&input)?;
                ProofValue::DetachedJws(format!("{header_b64}..{}", to_base64(signature)))
            }
        };

        self.proofs.push(Proof {
            created,
            suite_type: context.suite.algorithm_id().into(),
            verification_method: context.verification_method.clone(),
            value,
        });
        Ok(())
    }

    /// Verify every proof attached to this credential.
    ///
    /// Each proof is recomputed using its own representation and verified against the key
    /// resolved for its verification method. All proofs must verify; a failure names the
    /// offending proof. A policy of "at least one valid proof suffices" is a caller
    /// decision, not implemented here.
    pub fn verify_proofs(
        &self,
        resolver: &dyn KeyResolver,
        algorithms: &AlgorithmRegistry,
    ) -> Result<(), ProofVerificationError> {
        for (index, proof) in self.proofs.iter().enumerate() {
            self.verify_proof(proof, resolver, algorithms).map_err(|source| ProofVerificationError {
                index,
                verification_method: proof.verification_method.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn verify_proof(
        &self,
        proof: &Proof,
        resolver: &dyn KeyResolver,
        algorithms: &AlgorithmRegistry,
    ) -> Result<(), ProofFailure> {
        let algorithm = algorithms.resolve(&proof.suite_type)?;
        let key = resolver.fetch(&proof.verification_method)?;
        let document = signing_document(self)?;
        let document_bytes = crate::canonical::canonical_json(&document)?;

        match &proof.value {
            ProofValue::Embedded(payload) => {
                let signature = from_base64(payload).map_err(ProofFailure::Base64)?;
                algorithm.verify(&key, &document_bytes, &signature)?;
            }
            ProofValue::DetachedJws(payload) => {
                let (header_b64, signature_b64) =
                    payload.split_once("..").ok_or(ProofFailure::MalformedDetachedJws)?;
                if header_b64.is_empty() || signature_b64.contains('.') {
                    return Err(ProofFailure::MalformedDetachedJws);
                }
                let signature = from_base64(signature_b64).map_err(ProofFailure::Base64)?;
                let input = detached_signing_input(header_b64, &document_bytes);
                algorithm.verify(&key, &input, &signature)?;
            }
        }
        Ok(())
    }
}

// The document to be signed: this credential with its proofs cleared.
fn signing_document(credential: &Credential) -> Result<Value, serde_json::Error> {
    let mut unsigned = credential.clone();
    unsigned.proofs.clear();
    serde_json::to_value(&unsigned)
}

fn detached_signing_input(header_b64: &str, document: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(header_b64.len() + 1 + document.len());
    input.extend_from_slice(header_b64.as_bytes());
    input.push(b'.');
    input.extend_from_slice(document);
    input
}

/// An error when attaching a proof.
#[derive(Debug, thiserror::Error)]
pub enum AddProofError {
    #[error("proof context has no creation time")]
    MissingCreated,

    #[error(transparent)]
    Schema(#[from] SchemaValidationError),

    #[error("serializing document: {0}")]
    Document(#[from] serde_json::Error),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// A proof that failed verification, identified among possibly several.
#[derive(Debug, thiserror::Error)]
#[error("proof {index} ({verification_method}) failed: {source}")]
pub struct ProofVerificationError {
    /// The position of the failed proof in the credential's proof list.
    pub index: usize,

    /// The verification method of the failed proof.
    pub verification_method: String,

    /// What went wrong.
    #[source]
    pub source: ProofFailure,
}

/// The cause of a single proof verification failure.
#[derive(Debug, thiserror::Error)]
pub enum ProofFailure {
    #[error(transparent)]
    UnsupportedAlgorithm(#[from] UnsupportedAlgorithmError),

    #[error(transparent)]
    KeyResolution(#[from] KeyResolutionError),

    #[error(transparent)]
    SignatureInvalid(#[from] SignatureInvalidError),

    #[error("malformed detached signature token")]
    MalformedDetachedJws,

    #[error("invalid base64 in proof payload: {0}")]
    Base64(base64::DecodeError),

    #[error("serializing document: {0}")]
    Document(#[from] serde_json::Error),
}
