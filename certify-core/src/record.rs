//! Canonical certificate records.
//!
//! The canonical record is the certificate document itself: its bytes are what
//! the issuer hands out and what a verifier re-hashes. Canonical form is
//! compact JSON with keys in lexicographic order:
//!
//! ```text
//! {"course_name":…,"issued_at":"YYYY-MM-DDTHH:MM:SS.mmmZ","nonce":<32 hex>,
//!  "organization_id":…,"owner_name":…,"version":1}
//! ```
//!
//! `issued_at` is UTC with millisecond precision and `nonce` carries 128 random
//! bits, so repeated issuances with the same owner, course and organization
//! always produce distinct fingerprints.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CertifyError, Result};
use crate::fingerprint::Fingerprint;

/// Current canonical record layout version.
pub const RECORD_VERSION: u32 = 1;

/// Maximum length of owner and course names, in characters.
pub const MAX_FIELD_CHARS: usize = 256;

const NONCE_BYTES: usize = 16;

/// Issuance request fields before canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateDraft {
    pub owner_name: String,
    pub course_name: String,
    pub organization_id: i64,
}

impl CertificateDraft {
    pub fn new(
        owner_name: impl Into<String>,
        course_name: impl Into<String>,
        organization_id: i64,
    ) -> Self {
        Self {
            owner_name: owner_name.into(),
            course_name: course_name.into(),
            organization_id,
        }
    }

    /// Validate and normalize (trim) the draft.
    pub fn validate(&self) -> Result<Self> {
        let owner_name = validate_text("owner_name", &self.owner_name)?;
        let course_name = validate_text("course_name", &self.course_name)?;
        if self.organization_id <= 0 {
            return Err(CertifyError::invalid_field(
                "organization_id",
                "must be a positive integer",
            ));
        }

        Ok(Self {
            owner_name,
            course_name,
            organization_id: self.organization_id,
        })
    }
}

fn validate_text(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CertifyError::invalid_field(field, "must not be empty"));
    }
    if trimmed.chars().count() > MAX_FIELD_CHARS {
        return Err(CertifyError::invalid_field(
            field,
            format!("must be at most {MAX_FIELD_CHARS} characters"),
        ));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(CertifyError::invalid_field(
            field,
            "must not contain control characters",
        ));
    }
    Ok(trimmed.to_string())
}

/// Canonical certificate document.
///
/// Field declaration order is the serialized key order and must stay sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanonicalRecord {
    pub course_name: String,
    #[serde(with = "millis_rfc3339")]
    pub issued_at: DateTime<Utc>,
    pub nonce: String,
    pub organization_id: i64,
    pub owner_name: String,
    pub version: u32,
}

impl CanonicalRecord {
    /// Build a record for a validated draft with a fresh random nonce.
    pub fn issue(draft: &CertificateDraft, issued_at: DateTime<Utc>) -> Result<Self> {
        Self::with_nonce(draft, issued_at, rand::random::<[u8; NONCE_BYTES]>())
    }

    /// Build a record with an explicit nonce. Used for reproducible documents.
    pub fn with_nonce(
        draft: &CertificateDraft,
        issued_at: DateTime<Utc>,
        nonce: [u8; NONCE_BYTES],
    ) -> Result<Self> {
        let draft = draft.validate()?;
        Ok(Self {
            course_name: draft.course_name,
            issued_at: truncate_to_millis(issued_at),
            nonce: hex::encode(nonce),
            organization_id: draft.organization_id,
            owner_name: draft.owner_name,
            version: RECORD_VERSION,
        })
    }

    /// Canonical document bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CertifyError::SerializationError(e.to_string()))
    }

    /// Fingerprint of the canonical bytes (the certificate's `cert_hash`).
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        Ok(Fingerprint::of_bytes(&self.to_bytes()?))
    }

    /// Parse a document and check it is byte-for-byte canonical.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record: Self = serde_json::from_slice(bytes)
            .map_err(|e| CertifyError::SerializationError(format!("invalid document: {e}")))?;

        if record.version != RECORD_VERSION {
            return Err(CertifyError::SerializationError(format!(
                "unsupported record version {} (current: {})",
                record.version, RECORD_VERSION
            )));
        }
        if record.nonce.len() != NONCE_BYTES * 2
            || !record
                .nonce
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(CertifyError::SerializationError(
                "nonce must be 32 lowercase hex characters".into(),
            ));
        }
        if record.to_bytes()? != bytes {
            return Err(CertifyError::SerializationError(
                "document is not in canonical form".into(),
            ));
        }

        Ok(record)
    }
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

mod millis_rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// RFC 3339 rendering used in canonical documents.
pub fn format_issued_at(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
