use crate::{jwt, proof::Proof, resolver::KeyResolver, suite::AlgorithmRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, OneOrMany};

/// A JSON object that preserves field order.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// The base context every credential must carry as its first context entry.
pub const BASE_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// The base type label every credential must carry.
pub const BASE_TYPE: &str = "VerifiableCredential";

/// A verifiable credential.
///
/// This is the central entity all operations in this crate act on. It is immutable by
/// convention in every field except `proofs`, which only grows through
/// [Credential::add_proof](crate::proof).
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// The ordered context URIs; the first entry is fixed to [BASE_CONTEXT].
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    /// The global identifier of this credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The type labels; must contain [BASE_TYPE].
    #[serde(rename = "type")]
    pub types: Vec<String>,

    /// The claim payload this credential is about.
    #[serde(rename = "credentialSubject", with = "subject_repr")]
    pub subject: Subject,

    /// The credential issuer.
    #[serde(with = "issuer_repr")]
    pub issuer: Issuer,

    /// The timestamp at which this credential was issued.
    #[serde(
        rename = "issuanceDate",
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub issued: Option<DateTime<Utc>>,

    /// The timestamp at which this credential expires.
    ///
    /// Compared for presence only; no ordering against `issued` is enforced.
    #[serde(
        rename = "expirationDate",
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expired: Option<DateTime<Utc>>,

    /// The schema references for this credential, possibly empty.
    #[serde(rename = "credentialSchema", default)]
    pub schemas: Vec<TypedId>,

    /// The proofs attached to this credential, in attach order.
    ///
    /// A lone proof serializes back as a single JSON object rather than a one-element array.
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(rename = "proof", default, skip_serializing_if = "Vec::is_empty")]
    pub proofs: Vec<Proof>,

    /// Extension fields, merged at the top level of the document.
    #[serde(flatten)]
    pub extra: JsonObject,
}

/// The issuer of a credential.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Issuer {
    /// The issuer identifier URI.
    pub id: String,

    /// An optional display name.
    pub name: Option<String>,
}

/// The subject of a credential: an optional identifier plus open extension fields.
///
/// The domain schema of the extension fields is supplied by the caller, not by this crate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// The subject identifier URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The claim fields, in document order.
    #[serde(flatten)]
    pub properties: JsonObject,
}

/// A typed identifier, as used in schema references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypedId {
    pub id: String,

    #[serde(rename = "type")]
    pub id_type: String,
}

impl Credential {
    /// Parse a credential from either of its trust-bearing representations.
    ///
    /// Input that consists of exactly three dot-separated base64url segments is treated as a
    /// compact signed token; anything else is parsed as a raw JSON document. When a resolver
    /// is supplied, token signatures are verified; without one the token is decoded in an
    /// explicitly lower-trust, unverified mode. The parsed credential is validated before it
    /// is returned.
    pub fn parse(
        input: &[u8],
        resolver: Option<&dyn KeyResolver>,
        algorithms: &AlgorithmRegistry,
    ) -> Result<Self, CredentialParseError> {
        let token = std::str::from_utf8(input).ok().map(str::trim).filter(|s| is_compact_token(s));
        let credential = match token {
            Some(token) => jwt::decode(token, resolver, algorithms)?.claims.into_credential(),
            None => serde_json::from_slice(input).map_err(CredentialParseError::Json)?,
        };
        credential.validate()?;
        Ok(credential)
    }

    /// Validate the structural invariants of this credential.
    pub fn validate(&self) -> Result<(), SchemaValidationError> {
        match self.context.first() {
            None => return Err(SchemaValidationError::MissingContext),
            Some(base) if base != BASE_CONTEXT => {
                return Err(SchemaValidationError::InvalidBaseContext(base.clone()))
            }
            Some(_) => (),
        };
        if !self.types.iter().any(|t| t == BASE_TYPE) {
            return Err(SchemaValidationError::MissingBaseType);
        }
        if self.issuer.id.is_empty() {
            return Err(SchemaValidationError::MissingIssuerId);
        }
        Ok(())
    }
}

/// Check whether the input looks like a compact token: exactly three dot-separated,
/// non-empty base64url segments.
pub(crate) fn is_compact_token(input: &str) -> bool {
    let mut segments = input.split('.');
    let well_formed = (0..3).all(|_| segments.next().is_some_and(is_base64url_segment));
    well_formed && segments.next().is_none()
}

fn is_base64url_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// An error when parsing a credential from bytes.
#[derive(Debug, thiserror::Error)]
pub enum CredentialParseError {
    #[error("invalid credential JSON: {0}")]
    Json(serde_json::Error),

    #[error(transparent)]
    Token(#[from] jwt::DecodeError),

    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
}

/// An error when a credential violates a structural invariant.
#[derive(Debug, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("credential has no context")]
    MissingContext,

    #[error("first context entry must be '{BASE_CONTEXT}', found '{0}'")]
    InvalidBaseContext(String),

    #[error("credential types do not include '{BASE_TYPE}'")]
    MissingBaseType,

    #[error("issuer id is empty")]
    MissingIssuerId,
}

mod issuer_repr {
    use super::Issuer;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    // The document form is either a bare URI string or an object `{id, name}`. An issuer
    // with no display name serializes back to the bare form.
    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Uri(String),
        Object {
            #[serde(default, skip_serializing_if = "String::is_empty")]
            id: String,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            name: Option<String>,
        },
    }

    pub(super) fn serialize<S: Serializer>(issuer: &Issuer, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match &issuer.name {
            None => Repr::Uri(issuer.id.clone()),
            Some(_) => Repr::Object { id: issuer.id.clone(), name: issuer.name.clone() },
        };
        repr.serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Issuer, D::Error> {
        let issuer = match Repr::deserialize(deserializer)? {
            Repr::Uri(id) => Issuer { id, name: None },
            Repr::Object { id, name } => Issuer { id, name },
        };
        Ok(issuer)
    }
}

mod subject_repr {
    use super::Subject;
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    // The document form allows an object or an array of objects; this model holds exactly
    // one subject, so arrays must contain a single entry.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        One(Subject),
        Many(Vec<Subject>),
    }

    pub(super) fn serialize<S: Serializer>(subject: &Subject, serializer: S) -> Result<S::Ok, S::Error> {
        subject.serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Subject, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::One(subject) => Ok(subject),
            Repr::Many(mut subjects) if subjects.len() == 1 => Ok(subjects.remove(0)),
            Repr::Many(subjects) => {
                Err(D::Error::custom(format!("expected a single credential subject, found {}", subjects.len())))
            }
        }
    }
}

/// Serde helpers for RFC3339 timestamps with UTC `Z` suffix and second precision.
pub(crate) mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let parsed = DateTime::parse_from_rfc3339(&raw).map_err(D::Error::custom)?;
        Ok(parsed.with_timezone(&Utc))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            timestamp: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match timestamp {
                Some(timestamp) => super::serialize(timestamp, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw {
                Some(raw) => {
                    let parsed = DateTime::parse_from_rfc3339(&raw).map_err(D::Error::custom)?;
                    Ok(Some(parsed.with_timezone(&Utc)))
                }
                None => Ok(None),
            }
        }
    }
}
