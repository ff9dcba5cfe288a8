//! Common utility functions shared across CLI commands.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use certify_core::{fingerprint_reader, CertifyError, Fingerprint};
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use crate::exit_codes::{INVALID_ARGUMENT, READ_FAILED};

/// Stream a file from disk into its fingerprint.
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let file = File::open(path)
        .with_context(|| format!("{READ_FAILED}: {}", path.display()))?;

    let fingerprint = fingerprint_reader(BufReader::new(file)).map_err(|e| match e {
        CertifyError::EmptyDocument => {
            anyhow!("{READ_FAILED}: {} is empty", path.display())
        }
        other => anyhow!(other).context(format!("{READ_FAILED}: {}", path.display())),
    })?;

    debug!(path = %path.display(), hash = %fingerprint.to_hex(), "Fingerprinted file");
    Ok(fingerprint)
}

/// Parse an RFC 3339 issuance time.
pub fn parse_issued_at(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("{INVALID_ARGUMENT}: --issued-at '{raw}' is not RFC 3339 ({e})"))
}

/// Parse a 16-byte nonce from 32 hex characters.
pub fn parse_nonce(raw: &str) -> Result<[u8; 16]> {
    let bytes = hex::decode(raw.trim())
        .map_err(|e| anyhow!("{INVALID_ARGUMENT}: --nonce is not hex ({e})"))?;
    bytes
        .try_into()
        .map_err(|_| anyhow!("{INVALID_ARGUMENT}: --nonce must be 32 hex characters"))
}

/// Format a Unix timestamp (seconds) as a human-readable UTC string.
pub fn format_timestamp(timestamp_secs: u64) -> String {
    match i64::try_from(timestamp_secs)
        .ok()
        .map(|secs| Utc.timestamp_opt(secs, 0))
    {
        Some(chrono::LocalResult::Single(dt)) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        _ => format!("{}s", timestamp_secs),
    }
}
