//! Content fingerprints.
//!
//! A fingerprint is the SHA-256 digest of a certificate document's raw bytes,
//! rendered as 64 lowercase hex characters. It is the lookup key for both the
//! local certificate store and the on-chain registry.

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{CertifyError, Result};

/// Digest length in bytes.
pub const FINGERPRINT_BYTES: usize = 32;

/// Length of the hex rendering.
pub const FINGERPRINT_HEX_LEN: usize = FINGERPRINT_BYTES * 2;

const READ_BLOCK_SIZE: usize = 4096;

/// SHA-256 fingerprint of a certificate document.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_BYTES]);

impl Fingerprint {
    /// Parse a client-supplied hash string.
    ///
    /// Accepts exactly 64 hex characters in either case; surrounding
    /// whitespace is ignored. No `0x` prefix.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CertifyError::InvalidHash("hash is empty".into()));
        }
        if let Some(c) = trimmed.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(CertifyError::InvalidHash(format!(
                "not hexadecimal: invalid character {c:?}"
            )));
        }
        if trimmed.len() != FINGERPRINT_HEX_LEN {
            return Err(CertifyError::InvalidHash(format!(
                "expected {} hex characters, got {}",
                FINGERPRINT_HEX_LEN,
                trimmed.len()
            )));
        }

        let mut bytes = [0u8; FINGERPRINT_BYTES];
        hex::decode_to_slice(trimmed, &mut bytes)
            .map_err(|e| CertifyError::InvalidHash(format!("not hexadecimal: {e}")))?;
        Ok(Self(bytes))
    }

    /// Hash raw bytes. Deterministic; accepts empty input.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn from_digest(bytes: [u8; FINGERPRINT_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = CertifyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Fingerprint an uploaded document. Empty documents are rejected.
pub fn fingerprint_document(data: &[u8]) -> Result<Fingerprint> {
    if data.is_empty() {
        return Err(CertifyError::EmptyDocument);
    }
    Ok(Fingerprint::of_bytes(data))
}

/// Streaming variant of [`fingerprint_document`] for files on disk.
pub fn fingerprint_reader<R: Read>(mut reader: R) -> Result<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut block = [0u8; READ_BLOCK_SIZE];
    let mut total = 0usize;

    loop {
        let n = reader.read(&mut block)?;
        if n == 0 {
            break;
        }
        hasher.update(&block[..n]);
        total += n;
    }

    if total == 0 {
        return Err(CertifyError::EmptyDocument);
    }
    Ok(Fingerprint(hasher.finalize().into()))
}
