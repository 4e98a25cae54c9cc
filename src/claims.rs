use crate::credential::{Credential, SchemaValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The compact registered-claims projection of a credential.
///
/// The registered fields carry the values promoted out of the credential; `vc` carries the
/// rest of the document with the promoted values stripped. The projection is invertible
/// through [Claims::into_credential].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The timestamp at which the credential expires.
    #[serde(
        rename = "exp",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    /// The timestamp at which the credential was issued.
    #[serde(
        rename = "iat",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub issued_at: Option<DateTime<Utc>>,

    /// The credential issuer.
    #[serde(rename = "iss")]
    pub issuer: String,

    /// The credential identifier.
    #[serde(rename = "jti", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The first timestamp at which the credential is valid.
    #[serde(
        rename = "nbf",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_before: Option<DateTime<Utc>>,

    /// The credential subject identifier.
    #[serde(rename = "sub", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// The credential content not already carried by the registered fields.
    #[serde(rename = "vc")]
    pub credential: Credential,
}

impl Claims {
    /// Project a credential into its compact registered-claims form.
    ///
    /// The credential is validated first, so an invalid credential fails fast instead of
    /// producing an invalid artifact. With `minimize_subject` the subject identifier lives
    /// only in the registered `sub` field; without it the identifier is additionally kept
    /// inside `vc`, matching legacy-compatibility consumers.
    pub fn from_credential(credential: &Credential, minimize_subject: bool) -> Result<Self, SchemaValidationError> {
        credential.validate()?;

        let mut stripped = credential.clone();
        stripped.id = None;
        stripped.issued = None;
        stripped.expired = None;
        stripped.issuer.id = String::new();
        let subject = stripped.subject.id.clone();
        if minimize_subject {
            stripped.subject.id = None;
        }

        Ok(Self {
            expires_at: credential.expired,
            issued_at: credential.issued,
            issuer: credential.issuer.id.clone(),
            id: credential.id.clone(),
            not_before: credential.issued,
            subject,
            credential: stripped,
        })
    }

    /// Reconstruct the credential, merging the registered fields back into `vc`.
    ///
    /// This is a left inverse of [Claims::from_credential] for credentials that round-trip
    /// through standard JSON-representable field types.
    pub fn into_credential(self) -> Credential {
        let Self { expires_at, issued_at, issuer, id, not_before, subject, mut credential } = self;
        credential.id = id;
        credential.issuer.id = issuer;
        credential.issued = issued_at.or(not_before);
        credential.expired = expires_at;
        if subject.is_some() {
            credential.subject.id = subject;
        }
        credential
    }
}
