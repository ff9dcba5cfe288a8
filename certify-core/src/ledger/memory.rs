//! In-process certificate registry.
//!
//! Mirrors the registry contract's state machine without a network. Used when
//! no chain RPC endpoint is configured and throughout the test suites.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use super::{AnchorReceipt, Ledger, OnChainAttestation, RevocationOutcome};
use crate::error::{CertifyError, Result};
use crate::fingerprint::Fingerprint;

/// Issuer address reported when none is configured.
pub const DEFAULT_MEMORY_ISSUER: &str = "0x000000000000000000000000000000000000c371";

/// In-memory ledger backed by a concurrent map.
pub struct MemoryLedger {
    issuer_address: String,
    attestations: DashMap<Fingerprint, OnChainAttestation>,
    block_height: AtomicU64,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_ISSUER)
    }
}

impl MemoryLedger {
    pub fn new(issuer_address: impl Into<String>) -> Self {
        Self {
            issuer_address: issuer_address.into(),
            attestations: DashMap::new(),
            block_height: AtomicU64::new(0),
        }
    }

    /// Number of anchored certificates.
    pub fn len(&self) -> usize {
        self.attestations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attestations.is_empty()
    }

    fn next_receipt(&self, op: &[u8], hash: &Fingerprint) -> AnchorReceipt {
        let block = self.block_height.fetch_add(1, Ordering::SeqCst) + 1;

        let mut hasher = Sha256::new();
        hasher.update(op);
        hasher.update(hash.as_bytes());
        hasher.update(block.to_be_bytes());

        AnchorReceipt {
            tx_hash: format!("0x{}", hex::encode(hasher.finalize())),
            block_number: Some(block),
        }
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn anchor(&self, hash: &Fingerprint) -> Result<AnchorReceipt> {
        match self.attestations.entry(*hash) {
            Entry::Occupied(_) => Err(CertifyError::ChainRejected(format!(
                "certificate {hash} is already issued"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(OnChainAttestation {
                    issuer_address: self.issuer_address.clone(),
                    timestamp: Utc::now().timestamp().max(0) as u64,
                    revoked: false,
                });
                let receipt = self.next_receipt(b"issue", hash);
                tracing::debug!(cert_hash = %hash, tx_hash = %receipt.tx_hash, "Anchored in memory ledger");
                Ok(receipt)
            }
        }
    }

    async fn attestation(&self, hash: &Fingerprint) -> Result<Option<OnChainAttestation>> {
        Ok(self.attestations.get(hash).map(|entry| entry.value().clone()))
    }

    async fn revoke(&self, hash: &Fingerprint) -> Result<RevocationOutcome> {
        let mut entry = self.attestations.get_mut(hash).ok_or_else(|| {
            CertifyError::NotFound(format!("certificate {hash} is not anchored on chain"))
        })?;

        if entry.revoked {
            return Ok(RevocationOutcome::AlreadyRevoked);
        }
        entry.revoked = true;
        drop(entry);

        Ok(RevocationOutcome::Revoked(self.next_receipt(b"revoke", hash)))
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_anchor_then_lookup() {
        let ledger = MemoryLedger::default();
        let hash = Fingerprint::of_bytes(b"certificate");

        assert!(ledger.attestation(&hash).await.unwrap().is_none());

        let receipt = ledger.anchor(&hash).await.unwrap();
        assert!(receipt.tx_hash.starts_with("0x"));
        assert_eq!(receipt.tx_hash.len(), 66);
        assert_eq!(receipt.block_number, Some(1));

        let attestation = ledger.attestation(&hash).await.unwrap().unwrap();
        assert_eq!(attestation.issuer_address, DEFAULT_MEMORY_ISSUER);
        assert!(!attestation.revoked);
        assert!(attestation.timestamp > 0);
    }

    #[tokio::test]
    async fn test_double_anchor_is_rejected() {
        let ledger = MemoryLedger::default();
        let hash = Fingerprint::of_bytes(b"certificate");
        ledger.anchor(&hash).await.unwrap();

        let err = ledger.anchor(&hash).await.unwrap_err();
        assert!(matches!(err, CertifyError::ChainRejected(_)));
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_revoke_is_one_way_and_idempotent() {
        let ledger = MemoryLedger::new("0xissuer");
        let hash = Fingerprint::of_bytes(b"certificate");
        ledger.anchor(&hash).await.unwrap();

        let first = ledger.revoke(&hash).await.unwrap();
        assert!(matches!(first, RevocationOutcome::Revoked(_)));
        let second = ledger.revoke(&hash).await.unwrap();
        assert_eq!(second, RevocationOutcome::AlreadyRevoked);

        let attestation = ledger.attestation(&hash).await.unwrap().unwrap();
        assert!(attestation.revoked);
        assert_eq!(attestation.issuer_address, "0xissuer");
    }

    #[tokio::test]
    async fn test_revoke_unknown_hash() {
        let ledger = MemoryLedger::default();
        let err = ledger
            .revoke(&Fingerprint::of_bytes(b"never issued"))
            .await
            .unwrap_err();
        assert!(matches!(err, CertifyError::NotFound(_)));
    }
}
