//! Certificate verification
//!
//! Resolves a fingerprint against the local records and the on-chain
//! registry. Read-only. Chain lookup failures degrade the report instead of
//! failing the request.

use certify_core::{fingerprint_document, Fingerprint, OnChainAttestation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::{AnchorStatus, Certificate, CertificateRecord};
use crate::error::ApiError;
use crate::state::AppState;

/// Detail returned when a fingerprint has no local record.
pub const NOT_FOUND_DETAIL: &str = "Certificate not found in local records";

/// Overall verdict of a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Anchored and not revoked on either side
    Valid,
    /// Revoked locally or on chain
    Revoked,
    /// Stored locally, anchoring not yet confirmed
    PendingAnchor,
    /// Recorded as anchored but the chain has no attestation
    ChainMismatch,
    /// The chain could not be queried
    ChainUnavailable,
}

/// On-chain attestation as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OnChainRecord {
    /// Account that anchored the certificate
    #[schema(example = "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1")]
    pub issuer_address: String,
    /// Block timestamp of the anchoring transaction (Unix seconds)
    #[schema(example = 1767866400)]
    pub timestamp: u64,
    /// Whether the certificate has been revoked on chain
    pub revoked: bool,
}

impl From<OnChainAttestation> for OnChainRecord {
    fn from(att: OnChainAttestation) -> Self {
        Self {
            issuer_address: att.issuer_address,
            timestamp: att.timestamp,
            revoked: att.revoked,
        }
    }
}

/// Verification result
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerificationReport {
    /// Local certificate record
    pub local_record: CertificateRecord,
    /// On-chain attestation; `null` when absent or the chain is unreachable
    pub on_chain: Option<OnChainRecord>,
    /// Overall verdict
    pub status: VerificationStatus,
}

/// Verify a certificate by its hex fingerprint.
///
/// Malformed input fails before any lookup.
pub async fn verify_hash(state: &AppState, raw: &str) -> Result<VerificationReport, ApiError> {
    let hash = Fingerprint::parse(raw)?;
    resolve(state, &hash, "hash").await
}

/// Verify a certificate by its document bytes.
pub async fn verify_document(
    state: &AppState,
    document: &[u8],
) -> Result<VerificationReport, ApiError> {
    let hash = fingerprint_document(document)?;
    resolve(state, &hash, "file").await
}

async fn resolve(
    state: &AppState,
    hash: &Fingerprint,
    source: &'static str,
) -> Result<VerificationReport, ApiError> {
    let cert_hash = hash.to_hex();

    let cert = state
        .db
        .certificates()
        .find_by_hash(&cert_hash)
        .await?
        .ok_or_else(|| {
            tracing::info!(cert_hash = %cert_hash, source, "Verification miss");
            ApiError::not_found(NOT_FOUND_DETAIL)
        })?;

    let chain = match state.ledger.attestation(hash).await {
        Ok(attestation) => Ok(attestation),
        Err(e) => {
            tracing::warn!(
                cert_hash = %cert_hash,
                ledger = state.ledger.name(),
                error = %e,
                "Chain lookup failed; reporting local record only"
            );
            Err(e)
        }
    };

    let status = classify(&cert, chain.as_ref().ok().and_then(|a| a.as_ref()), chain.is_ok());

    tracing::info!(
        certificate_id = cert.id,
        cert_hash = %cert_hash,
        source,
        status = ?status,
        "Certificate verified"
    );

    Ok(VerificationReport {
        local_record: cert.into(),
        on_chain: chain.ok().flatten().map(OnChainRecord::from),
        status,
    })
}

fn classify(
    cert: &Certificate,
    on_chain: Option<&OnChainAttestation>,
    chain_reachable: bool,
) -> VerificationStatus {
    if cert.revoked || on_chain.is_some_and(|a| a.revoked) {
        VerificationStatus::Revoked
    } else if cert.anchor_status != AnchorStatus::Anchored {
        VerificationStatus::PendingAnchor
    } else if !chain_reachable {
        VerificationStatus::ChainUnavailable
    } else if on_chain.is_none() {
        VerificationStatus::ChainMismatch
    } else {
        VerificationStatus::Valid
    }
}
