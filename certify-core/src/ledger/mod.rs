//! On-chain certificate attestations.
//!
//! The registry contract stores one attestation per fingerprint:
//! `{issuer_address, timestamp, revoked}`. Attestations are written once; the
//! only later mutation is `revoked: false -> true`, and there is no way back.
//!
//! ## Backends
//!
//! - [`EvmLedger`] - Ethereum JSON-RPC against the certificate registry contract
//! - [`MemoryLedger`] - In-process registry for development and tests

pub mod abi;
mod evm;
mod memory;
mod retry;

pub use evm::{EvmLedger, EvmLedgerConfig};
pub use memory::MemoryLedger;
pub use retry::{anchor_with_retry, RetryPolicy};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fingerprint::Fingerprint;

/// Attestation as recorded by the registry contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainAttestation {
    /// Account that anchored the certificate
    pub issuer_address: String,
    /// Block timestamp of the anchoring transaction (Unix seconds)
    pub timestamp: u64,
    /// Whether the certificate has been revoked
    pub revoked: bool,
}

/// Transaction hash recorded when an existing attestation is adopted and the
/// transaction that created it is not known.
pub const UNKNOWN_TX_HASH: &str = "unknown";

/// Confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

impl AnchorReceipt {
    /// Receipt for an attestation found on chain rather than submitted.
    pub fn adopted() -> Self {
        Self {
            tx_hash: UNKNOWN_TX_HASH.to_string(),
            block_number: None,
        }
    }

    pub fn is_adopted(&self) -> bool {
        self.tx_hash == UNKNOWN_TX_HASH
    }
}

/// Result of a revocation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationOutcome {
    /// The attestation moved from active to revoked in this transaction
    Revoked(AnchorReceipt),
    /// The attestation was already revoked; nothing was sent
    AlreadyRevoked,
}

/// Certificate registry on a distributed ledger.
///
/// Implementations must be thread-safe (`Send + Sync`). Network-backed
/// implementations return [`crate::CertifyError::ChainTimeout`] or
/// [`crate::CertifyError::ChainUnavailable`] for transient failures so callers
/// can retry; everything else is permanent.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Backend identifier for logs and health output.
    fn name(&self) -> &'static str;

    /// Record `hash` on chain and wait for confirmation.
    ///
    /// Anchoring a hash that already has an attestation is rejected.
    async fn anchor(&self, hash: &Fingerprint) -> Result<AnchorReceipt>;

    /// Look up the attestation for `hash`, if any.
    async fn attestation(&self, hash: &Fingerprint) -> Result<Option<OnChainAttestation>>;

    /// Revoke the attestation for `hash`. Idempotent.
    ///
    /// Fails with `NotFound` when the hash was never anchored.
    async fn revoke(&self, hash: &Fingerprint) -> Result<RevocationOutcome>;

    /// Cheap liveness probe.
    async fn health(&self) -> Result<()>;
}
