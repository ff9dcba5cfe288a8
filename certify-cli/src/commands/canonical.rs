//! Canonical command - build the canonical certificate document offline.
//!
//! With `--issued-at` and `--nonce` the output is reproducible, which lets an
//! auditor rebuild a document from its fields and compare fingerprints.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use certify_core::{CanonicalRecord, CertificateDraft};
use chrono::Utc;
use colored::Colorize;
use tracing::info;

use crate::exit_codes::{INVALID_ARGUMENT, WRITE_FAILED};
use crate::utils::{parse_issued_at, parse_nonce};

pub struct CanonicalArgs {
    pub owner: String,
    pub course: String,
    pub org: i64,
    pub issued_at: Option<String>,
    pub nonce: Option<String>,
    pub output: Option<PathBuf>,
}

/// Execute the canonical command.
pub fn execute(args: CanonicalArgs, quiet: bool) -> Result<()> {
    let draft = CertificateDraft::new(args.owner, args.course, args.org);
    let issued_at = match args.issued_at.as_deref() {
        Some(raw) => parse_issued_at(raw)?,
        None => Utc::now(),
    };

    let record = match args.nonce.as_deref() {
        Some(raw) => CanonicalRecord::with_nonce(&draft, issued_at, parse_nonce(raw)?),
        None => CanonicalRecord::issue(&draft, issued_at),
    }
    .map_err(|e| anyhow!("{INVALID_ARGUMENT}: {e}"))?;

    let document = record.to_bytes()?;
    let hash = record.fingerprint()?;
    info!(hash = %hash, bytes = document.len(), "Built canonical document");

    match &args.output {
        Some(path) => {
            std::fs::write(path, &document)
                .with_context(|| format!("{WRITE_FAILED} document: {}", path.display()))?;
            if quiet {
                println!("{hash}");
            } else {
                println!(
                    "{} {}",
                    "Document written to".green(),
                    path.display().to_string().bold()
                );
                println!("   {} {}", "cert_hash:".dimmed(), hash);
            }
        }
        None => {
            println!("{}", String::from_utf8_lossy(&document));
            if !quiet {
                println!("{} {}", "cert_hash:".dimmed(), hash);
            }
        }
    }

    Ok(())
}
