use crate::{
    canonical,
    claims::Claims,
    resolver::{KeyResolutionError, KeyResolver},
    suite::{AlgorithmRegistry, SignatureInvalidError, SignatureSuite, SigningError, UnsupportedAlgorithmError},
};
use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

const TOKEN_TYPE: &str = "JWT";

/// The JOSE header of a compact token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoseHeader {
    /// The signing algorithm identifier.
    #[serde(rename = "alg")]
    pub algorithm: String,

    /// The identifier of the signing key, possibly empty.
    #[serde(rename = "kid", default)]
    pub key_id: String,

    /// The token type.
    #[serde(rename = "typ")]
    pub token_type: String,
}

/// A decoded compact token.
///
/// Carries the parsed claims along with the raw payload bytes, so callers can re-serialize
/// or inspect exactly what was signed.
#[derive(Clone, Debug)]
pub struct DecodedToken {
    /// The parsed JOSE header.
    pub header: JoseHeader,

    /// The parsed claims.
    pub claims: Claims,

    /// The raw payload bytes, exactly as carried in the token.
    pub payload: Vec<u8>,
}

/// Encode claims into a signed three-segment compact token.
///
/// Header and payload are serialized canonically, so identical claims and suite output
/// always produce an identical token.
pub fn encode(claims: &Claims, suite: &dyn SignatureSuite) -> Result<String, EncodeError> {
    let header = JoseHeader {
        algorithm: suite.algorithm_id().into(),
        key_id: String::new(),
        token_type: TOKEN_TYPE.into(),
    };
    let header_b64 = to_base64(canonical::canonical_json(&header)?);
    let payload_b64 = to_base64(canonical::canonical_json(claims)?);
    let input = format!("{header_b64}.{payload_b64}");
    let signature = suite.sign(input.as_bytes())?;
    Ok(format!("{input}.{}", to_base64(signature)))
}

/// An error when encoding a compact token.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("serializing token part: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Decode a compact token, verifying its signature when a resolver is supplied.
///
/// With a resolver, the public key is fetched for the header `kid` (or the `iss` claim when
/// `kid` is empty) and the signature is checked over the original encoded segments. Without
/// a resolver the signature is not checked; that mode is for local inspection only and
/// production flows must always supply a resolver.
pub fn decode(
    token: &str,
    resolver: Option<&dyn KeyResolver>,
    algorithms: &AlgorithmRegistry,
) -> Result<DecodedToken, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header_b64, payload_b64, signature_b64] =
        <[&str; 3]>::try_from(segments).map_err(|segments| DecodeError::SegmentCount(segments.len()))?;

    let header_bytes = from_base64(header_b64).map_err(|e| DecodeError::Base64("header", e))?;
    let header: JoseHeader =
        serde_json::from_slice(&header_bytes).map_err(|e| DecodeError::Json("header", e))?;
    let payload = from_base64(payload_b64).map_err(|e| DecodeError::Base64("payload", e))?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|e| DecodeError::Json("payload", e))?;
    let signature = from_base64(signature_b64).map_err(|e| DecodeError::Base64("signature", e))?;

    if let Some(resolver) = resolver {
        let algorithm = algorithms.resolve(&header.algorithm)?;
        let key_id = if header.key_id.is_empty() { claims.issuer.as_str() } else { header.key_id.as_str() };
        let key = resolver.fetch(key_id)?;
        let input = format!("{header_b64}.{payload_b64}");
        algorithm.verify(&key, input.as_bytes(), &signature)?;
    }

    Ok(DecodedToken { header, claims, payload })
}

/// An error when decoding a compact token.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),

    #[error("invalid base64 in {0}: {1}")]
    Base64(&'static str, base64::DecodeError),

    #[error("invalid JSON in {0}: {1}")]
    Json(&'static str, serde_json::Error),

    #[error(transparent)]
    UnsupportedAlgorithm(#[from] UnsupportedAlgorithmError),

    #[error(transparent)]
    KeyResolution(#[from] KeyResolutionError),

    #[error(transparent)]
    SignatureInvalid(#[from] SignatureInvalidError),
}

pub(crate) fn to_base64<T: AsRef<[u8]>>(input: T) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(input)
}

pub(crate) fn from_base64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_URL_SAFE_NO_PAD.decode(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credential::Credential,
        keypair::Keypair,
        resolver::SingleKey,
        suite::EDDSA,
    };
    use chrono::DateTime;
    use rstest::rstest;
    use serde_json::json;

    fn example_credential() -> Credential {
        let input = json!({
            "@context": [
                "https://www.w3.org/2018/credentials/v1",
                "https://www.w3.org/2018/credentials/examples/v1"
            ],
            "id": "http://example.edu/credentials/1872",
            "type": ["VerifiableCredential", "UniversityDegreeCredential"],
            "credentialSubject": {
                "id": "did:example:subject",
                "degree": {"type": "BachelorDegree", "university": "MIT"}
            },
            "issuer": {"id": "did:example:issuer", "name": "Example University"},
            "issuanceDate": "2010-01-01T19:23:24Z",
            "expirationDate": "2020-01-01T19:23:24Z",
            "referenceNumber": 83294847
        });
        serde_json::from_value(input).expect("invalid fixture")
    }

    fn example_token(keypair: &Keypair) -> String {
        let claims = Claims::from_credential(&example_credential(), true).expect("projection failed");
        encode(&claims, &keypair.jwt_suite()).expect("encoding failed")
    }

    #[test]
    fn token_has_three_base64url_segments() {
        let token = example_token(&Keypair::generate());
        let segments: Vec<_> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        for segment in segments {
            from_base64(segment).expect("invalid base64");
        }
    }

    #[test]
    fn header_carries_algorithm_and_type() {
        let token = example_token(&Keypair::generate());
        let header_b64 = token.split('.').next().expect("no header");
        let header = from_base64(header_b64).expect("invalid base64");
        let header: serde_json::Value = serde_json::from_slice(&header).expect("invalid header");
        assert_eq!(header, json!({"alg": EDDSA, "kid": "", "typ": "JWT"}));
    }

    #[test]
    fn encoding_is_deterministic() {
        let keypair = Keypair::from_bytes(&[7; 32]);
        assert_eq!(example_token(&keypair), example_token(&keypair));
    }

    #[test]
    fn decode_and_verify() {
        let keypair = Keypair::generate();
        let token = example_token(&keypair);

        let resolver = SingleKey::new(keypair.public_key());
        let decoded =
            decode(&token, Some(&resolver), &AlgorithmRegistry::default()).expect("decoding failed");

        assert_eq!(decoded.claims.issuer, "did:example:issuer");
        assert_eq!(decoded.claims.subject.as_deref(), Some("did:example:subject"));
        assert_eq!(decoded.claims.id.as_deref(), Some("http://example.edu/credentials/1872"));
        assert_eq!(decoded.claims.issued_at, Some(DateTime::from_timestamp(1262373804, 0).unwrap()));
        assert_eq!(decoded.claims.not_before, Some(DateTime::from_timestamp(1262373804, 0).unwrap()));
        assert_eq!(decoded.claims.expires_at, Some(DateTime::from_timestamp(1577906604, 0).unwrap()));
    }

    #[test]
    fn decoded_credential_matches_the_original() {
        let keypair = Keypair::generate();
        let credential = example_credential();
        let claims = Claims::from_credential(&credential, false).expect("projection failed");
        let token = encode(&claims, &keypair.jwt_suite()).expect("encoding failed");

        let resolver = SingleKey::new(keypair.public_key());
        let decoded =
            decode(&token, Some(&resolver), &AlgorithmRegistry::default()).expect("decoding failed");
        assert_eq!(decoded.claims.into_credential(), credential);
    }

    #[test]
    fn wrong_key_fails_with_invalid_signature() {
        let keypair = Keypair::generate();
        let other = Keypair::generate();
        let token = example_token(&keypair);

        let resolver = SingleKey::new(other.public_key());
        let err = decode(&token, Some(&resolver), &AlgorithmRegistry::default()).expect_err("decoding succeeded");
        assert!(matches!(err, DecodeError::SignatureInvalid(_)));
    }

    #[test]
    fn tampered_signature_is_detected() {
        let keypair = Keypair::generate();
        let token = example_token(&keypair);
        let (base, signature_b64) = token.rsplit_once('.').expect("malformed token");
        let signature = from_base64(signature_b64).expect("invalid base64");
        let resolver = SingleKey::new(keypair.public_key());
        let registry = AlgorithmRegistry::default();

        // Change every byte in the signature and make sure verification fails every time,
        // while the unverified mode still decodes the same token.
        for index in 0..signature.len() {
            let mut signature = signature.clone();
            signature[index] = signature[index].wrapping_add(1);
            let token = format!("{base}.{}", to_base64(signature));

            let err = decode(&token, Some(&resolver), &registry).expect_err("verification succeeded");
            assert!(matches!(err, DecodeError::SignatureInvalid(_)));
            decode(&token, None, &registry).expect("unverified decode failed");
        }
    }

    #[rstest]
    #[case::one_segment("eyJhbGciOiJFZERTQSJ9", 1)]
    #[case::two_segments("eyJhbGciOiJFZERTQSJ9.eyJpc3MiOiJ4In0", 2)]
    #[case::four_segments("a.b.c.d", 4)]
    fn wrong_segment_counts_are_rejected(#[case] input: &str, #[case] count: usize) {
        let err = decode(input, None, &AlgorithmRegistry::default()).expect_err("decoding succeeded");
        assert!(matches!(err, DecodeError::SegmentCount(n) if n == count));
    }

    #[rstest]
    #[case::bad_header_base64("&&&.eyJpc3MiOiJ4In0.c2ln")]
    #[case::bad_header_json("eyJpc3MiOiJ4In0.eyJpc3MiOiJ4In0.c2ln")]
    #[case::bad_payload_json("eyJhbGciOiJFZERTQSIsImtpZCI6IiIsInR5cCI6IkpXVCJ9.bm90LWpzb24.c2ln")]
    fn malformed_tokens_are_rejected(#[case] input: &str) {
        decode(input, None, &AlgorithmRegistry::default()).expect_err("decoding succeeded");
    }

    #[test]
    fn unregistered_algorithm_is_rejected() {
        let keypair = Keypair::generate();
        let token = example_token(&keypair);
        let resolver = SingleKey::new(keypair.public_key());

        // A registry without the EdDSA entry.
        let registry = AlgorithmRegistry::empty();
        let err = decode(&token, Some(&resolver), &registry).expect_err("decoding succeeded");
        assert!(matches!(err, DecodeError::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn missing_key_fails_with_resolution_error() {
        let keypair = Keypair::generate();
        let token = example_token(&keypair);
        let resolver = crate::resolver::KeyRing::new();

        let err = decode(&token, Some(&resolver), &AlgorithmRegistry::default()).expect_err("decoding succeeded");
        assert!(matches!(err, DecodeError::KeyResolution(_)));
    }
}
