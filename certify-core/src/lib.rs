//! Certify Core - certificate fingerprints and chain attestation primitives
//!
//! This crate provides the pieces shared by the issuance server and the CLI:
//!
//! # Features
//!
//! - SHA-256 fingerprints of certificate documents (`cert_hash`)
//! - Canonical, reproducible certificate records
//! - A [`Ledger`] abstraction over the on-chain certificate registry
//! - Bounded retry for anchoring transactions
//!
//! # Example
//!
//! ```no_run
//! use certify_core::{CanonicalRecord, CertificateDraft, Ledger, MemoryLedger};
//!
//! # async fn example() -> certify_core::Result<()> {
//! let draft = CertificateDraft::new("Jane Doe", "Blockchain 101", 1);
//! let record = CanonicalRecord::issue(&draft, chrono::Utc::now())?;
//! let hash = record.fingerprint()?;
//!
//! let ledger = MemoryLedger::default();
//! ledger.anchor(&hash).await?;
//! assert!(ledger.attestation(&hash).await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fingerprint;
pub mod record;

#[cfg(feature = "network")]
pub mod ledger;

pub use error::{CertifyError, ErrorKind, Result};
pub use fingerprint::{
    fingerprint_document, fingerprint_reader, Fingerprint, FINGERPRINT_BYTES,
    FINGERPRINT_HEX_LEN,
};
pub use record::{CanonicalRecord, CertificateDraft, MAX_FIELD_CHARS, RECORD_VERSION};

#[cfg(feature = "network")]
pub use ledger::{
    anchor_with_retry, AnchorReceipt, EvmLedger, EvmLedgerConfig, Ledger, MemoryLedger,
    OnChainAttestation, RetryPolicy, RevocationOutcome, UNKNOWN_TX_HASH,
};
