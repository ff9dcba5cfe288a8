//! Certificate issuance
//!
//! Issuance writes the canonical record locally first and anchors its
//! fingerprint on chain second. A record whose anchoring did not complete
//! stays `pending` and is finished by [`retry_anchor`] or the outbox worker;
//! the local row is never written twice.

use certify_core::{
    anchor_with_retry, CanonicalRecord, CertificateDraft, CertifyError, Fingerprint,
    RetryPolicy, RevocationOutcome, UNKNOWN_TX_HASH,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::AuthenticatedUser;
use crate::db::{AnchorStatus, Certificate, CertificateRecord, NewCertificate};
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for certificate issuance
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IssueRequest {
    /// Certificate holder
    #[schema(example = "Jane Doe")]
    pub owner_name: String,
    /// Course or achievement
    #[schema(example = "Blockchain 101")]
    pub course_name: String,
    /// Issuing organization
    #[schema(example = 1)]
    pub organization_id: i64,
}

/// Result of a completed issuance or anchor retry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssueResponse {
    /// Certificate identifier
    #[schema(example = 1)]
    pub id: i64,
    /// SHA-256 of the canonical document
    #[schema(example = "2903b5439103f0282f8e8f6ece03ff60c4b4461256d9507a8bab955193ced5b0")]
    pub cert_hash: String,
    /// Anchoring transaction hash
    #[schema(example = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060")]
    pub tx_hash: String,
}

/// Issue a certificate: validate, persist locally, anchor on chain.
pub async fn issue(
    state: &AppState,
    session: &AuthenticatedUser,
    request: IssueRequest,
) -> Result<IssueResponse, ApiError> {
    let draft = CertificateDraft::new(
        request.owner_name,
        request.course_name,
        request.organization_id,
    )
    .validate()?;

    let org = state
        .db
        .organizations()
        .get(draft.organization_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization not found"))?;
    session.require_org(org.id)?;

    let record = CanonicalRecord::issue(&draft, Utc::now())?;
    let document = record.to_bytes()?;
    let hash = Fingerprint::of_bytes(&document);

    let cert = state
        .db
        .certificates()
        .create(NewCertificate {
            cert_hash: hash.to_hex(),
            owner_name: record.owner_name,
            course_name: record.course_name,
            organization_id: org.id,
            document,
            created_at: record.issued_at,
        })
        .await?;

    tracing::info!(
        certificate_id = cert.id,
        cert_hash = %cert.cert_hash,
        organization_id = org.id,
        user_id = session.user.id,
        "Certificate stored; anchoring"
    );

    let outcome = resume_anchor(state, &cert, &state.retry_policy).await;
    settle(state, &cert, outcome).await
}

/// Re-run only the chain step for a record that is not yet anchored.
///
/// Already anchored records return their existing receipt.
pub async fn retry_anchor(
    state: &AppState,
    session: &AuthenticatedUser,
    id: i64,
) -> Result<IssueResponse, ApiError> {
    let cert = find_authorized(state, session, id).await?;

    if cert.anchor_status == AnchorStatus::Anchored {
        return Ok(IssueResponse {
            id: cert.id,
            tx_hash: cert
                .tx_hash
                .clone()
                .unwrap_or_else(|| UNKNOWN_TX_HASH.to_string()),
            cert_hash: cert.cert_hash,
        });
    }

    let outcome = resume_anchor(state, &cert, &state.retry_policy).await;
    settle(state, &cert, outcome).await
}

/// Chain step for a stored record. Returns the transaction hash.
///
/// An attestation already on chain is adopted; its transaction hash is the
/// one stored locally, if any.
pub(crate) async fn resume_anchor(
    state: &AppState,
    cert: &Certificate,
    policy: &RetryPolicy,
) -> Result<String, CertifyError> {
    let hash = Fingerprint::parse(&cert.cert_hash)?;
    let receipt = anchor_with_retry(state.ledger.as_ref(), &hash, policy).await?;

    match (&cert.tx_hash, receipt.is_adopted()) {
        (Some(known), true) => Ok(known.clone()),
        _ => Ok(receipt.tx_hash),
    }
}

/// Record a confirmed anchor.
///
/// A certificate revoked while its chain step ran is revoked on chain here.
/// When that fails transiently the record goes back to `pending`, keeping
/// its transaction hash, and the outbox finishes the revocation.
pub(crate) async fn finish_anchor(
    state: &AppState,
    cert: &Certificate,
    tx_hash: &str,
) -> Result<Certificate, ApiError> {
    let certs = state.db.certificates();
    let anchored = certs
        .mark_anchored(cert.id, tx_hash)
        .await?
        .ok_or_else(|| ApiError::not_found("Certificate not found"))?;

    if !anchored.revoked {
        return Ok(anchored);
    }

    match revoke_on_chain(state, &anchored).await {
        Ok(()) => Ok(anchored),
        Err(e) if e.is_retryable() => {
            let reason = format!("revocation not yet on chain: {e}");
            tracing::warn!(
                certificate_id = cert.id,
                error = %e,
                "Revoked before anchoring finished; revocation left to the outbox"
            );
            certs.reopen_anchor(cert.id, &reason).await?;
            Err(ApiError::AnchorPending {
                certificate_id: cert.id,
                cert_hash: cert.cert_hash.clone(),
                reason,
            })
        }
        Err(e) => {
            tracing::error!(
                certificate_id = cert.id,
                error = %e,
                "Chain refused revocation of a locally revoked certificate"
            );
            Ok(anchored)
        }
    }
}

/// Record the outcome of a chain step and build the caller's response.
async fn settle(
    state: &AppState,
    cert: &Certificate,
    outcome: Result<String, CertifyError>,
) -> Result<IssueResponse, ApiError> {
    let certs = state.db.certificates();

    match outcome {
        Ok(tx_hash) => {
            finish_anchor(state, cert, &tx_hash).await?;

            tracing::info!(
                certificate_id = cert.id,
                cert_hash = %cert.cert_hash,
                tx_hash = %tx_hash,
                "Certificate anchored"
            );

            Ok(IssueResponse {
                id: cert.id,
                cert_hash: cert.cert_hash.clone(),
                tx_hash,
            })
        }
        Err(e) if e.is_retryable() => {
            certs.record_anchor_failure(cert.id, &e.to_string()).await?;
            Err(ApiError::AnchorPending {
                certificate_id: cert.id,
                cert_hash: cert.cert_hash.clone(),
                reason: e.to_string(),
            })
        }
        Err(e) => {
            certs.mark_failed(cert.id, &e.to_string()).await?;
            Err(ApiError::AnchorFailed {
                certificate_id: cert.id,
                cert_hash: cert.cert_hash.clone(),
                reason: e.to_string(),
            })
        }
    }
}

/// Revoke an anchored certificate's attestation.
async fn revoke_on_chain(state: &AppState, cert: &Certificate) -> Result<(), CertifyError> {
    let hash = Fingerprint::parse(&cert.cert_hash)?;
    match state.ledger.revoke(&hash).await {
        Ok(RevocationOutcome::Revoked(receipt)) => {
            tracing::info!(
                certificate_id = cert.id,
                tx_hash = %receipt.tx_hash,
                "Revocation anchored on chain"
            );
        }
        Ok(RevocationOutcome::AlreadyRevoked) => {}
        Err(CertifyError::NotFound(_)) => {
            tracing::warn!(
                certificate_id = cert.id,
                cert_hash = %cert.cert_hash,
                "Anchored certificate has no attestation on chain; revoked locally only"
            );
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Revoke a certificate. One-way and idempotent.
///
/// The local flag is set first; an anchored certificate is then revoked on
/// chain. A transient chain failure is reported so the caller can repeat
/// the request.
pub async fn revoke(
    state: &AppState,
    session: &AuthenticatedUser,
    id: i64,
) -> Result<CertificateRecord, ApiError> {
    find_authorized(state, session, id).await?;

    let (cert, changed) = state
        .db
        .certificates()
        .mark_revoked(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Certificate not found"))?;

    if changed {
        tracing::info!(certificate_id = id, user_id = session.user.id, "Certificate revoked");
    }

    if cert.anchor_status == AnchorStatus::Anchored {
        revoke_on_chain(state, &cert).await?;
    }

    Ok(cert.into())
}

/// Administrative hard delete of the local record.
pub async fn delete(
    state: &AppState,
    session: &AuthenticatedUser,
    id: i64,
) -> Result<(), ApiError> {
    find_authorized(state, session, id).await?;

    if state.db.certificates().delete(id).await? {
        tracing::info!(certificate_id = id, user_id = session.user.id, "Certificate deleted");
        Ok(())
    } else {
        Err(ApiError::not_found("Certificate not found"))
    }
}

/// Load a certificate the session may act on.
pub async fn find_authorized(
    state: &AppState,
    session: &AuthenticatedUser,
    id: i64,
) -> Result<Certificate, ApiError> {
    let cert = state
        .db
        .certificates()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Certificate not found"))?;
    session.require_org(cert.organization_id)?;
    Ok(cert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use certify_core::{AnchorReceipt, Ledger, MemoryLedger, OnChainAttestation};

    use crate::auth::JwtKeys;
    use crate::config::Config;
    use crate::db::{Database, NewOrganization, User};

    /// Commits the first submission but loses its confirmation.
    #[derive(Default)]
    struct LostConfirmationLedger {
        inner: MemoryLedger,
        submissions: AtomicU32,
    }

    #[async_trait]
    impl Ledger for LostConfirmationLedger {
        fn name(&self) -> &'static str {
            "lost-confirmation"
        }

        async fn anchor(&self, hash: &Fingerprint) -> certify_core::Result<AnchorReceipt> {
            let receipt = self.inner.anchor(hash).await?;
            if self.submissions.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(CertifyError::ChainTimeout(Duration::from_secs(65)));
            }
            Ok(receipt)
        }

        async fn attestation(
            &self,
            hash: &Fingerprint,
        ) -> certify_core::Result<Option<OnChainAttestation>> {
            self.inner.attestation(hash).await
        }

        async fn revoke(&self, hash: &Fingerprint) -> certify_core::Result<RevocationOutcome> {
            self.inner.revoke(hash).await
        }

        async fn health(&self) -> certify_core::Result<()> {
            Ok(())
        }
    }

    /// Revokes the local record while its anchor transaction is in flight.
    struct RevokeDuringAnchorLedger {
        db: Database,
        inner: MemoryLedger,
        revoke_fails: bool,
    }

    #[async_trait]
    impl Ledger for RevokeDuringAnchorLedger {
        fn name(&self) -> &'static str {
            "revoke-during-anchor"
        }

        async fn anchor(&self, hash: &Fingerprint) -> certify_core::Result<AnchorReceipt> {
            let certs = self.db.certificates();
            if let Ok(Some(cert)) = certs.find_by_hash(&hash.to_hex()).await {
                let _ = certs.mark_revoked(cert.id).await;
            }
            self.inner.anchor(hash).await
        }

        async fn attestation(
            &self,
            hash: &Fingerprint,
        ) -> certify_core::Result<Option<OnChainAttestation>> {
            self.inner.attestation(hash).await
        }

        async fn revoke(&self, hash: &Fingerprint) -> certify_core::Result<RevocationOutcome> {
            if self.revoke_fails {
                return Err(CertifyError::ChainUnavailable("node offline".into()));
            }
            self.inner.revoke(hash).await
        }

        async fn health(&self) -> certify_core::Result<()> {
            Ok(())
        }
    }

    async fn setup() -> (AppState, AuthenticatedUser, i64) {
        setup_with(AppState::in_memory(Config::default())).await
    }

    async fn setup_with(state: AppState) -> (AppState, AuthenticatedUser, i64) {
        let org = state
            .db
            .organizations()
            .create(NewOrganization {
                name: "Certify Academy".into(),
                domain: None,
                wallet_address: None,
            })
            .await
            .unwrap();
        let session = AuthenticatedUser {
            user: User {
                id: 1,
                email: "admin@example.edu".into(),
                password_hash: String::new(),
                role: "admin".into(),
                organization_id: Some(org.id),
                created_at: Utc::now(),
            },
        };
        (state, session, org.id)
    }

    fn request(org: i64) -> IssueRequest {
        IssueRequest {
            owner_name: "Jane Doe".into(),
            course_name: "Blockchain 101".into(),
            organization_id: org,
        }
    }

    #[tokio::test]
    async fn test_issue_anchors_and_stores_document() {
        let (state, session, org) = setup().await;
        let issued = issue(&state, &session, request(org)).await.unwrap();

        assert_eq!(issued.cert_hash.len(), 64);
        assert!(!issued.tx_hash.is_empty());

        let cert = state
            .db
            .certificates()
            .find_by_id(issued.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cert.anchor_status, AnchorStatus::Anchored);
        assert_eq!(Fingerprint::of_bytes(&cert.document).to_hex(), issued.cert_hash);

        let record = CanonicalRecord::from_bytes(&cert.document).unwrap();
        assert_eq!(record.owner_name, "Jane Doe");
        assert_eq!(record.issued_at, cert.created_at);
    }

    #[tokio::test]
    async fn test_identical_requests_get_distinct_hashes() {
        let (state, session, org) = setup().await;
        let a = issue(&state, &session, request(org)).await.unwrap();
        let b = issue(&state, &session, request(org)).await.unwrap();
        assert_ne!(a.cert_hash, b.cert_hash);
    }

    #[tokio::test]
    async fn test_issue_validation_and_tenancy() {
        let (state, session, org) = setup().await;

        let mut blank = request(org);
        blank.owner_name = "   ".into();
        let err = issue(&state, &session, blank).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let err = issue(&state, &session, request(999)).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);

        let other = state
            .db
            .organizations()
            .create(NewOrganization {
                name: "Other".into(),
                domain: None,
                wallet_address: None,
            })
            .await
            .unwrap();
        let err = issue(&state, &session, request(other.id)).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_retry_on_anchored_is_idempotent() {
        let (state, session, org) = setup().await;
        let issued = issue(&state, &session, request(org)).await.unwrap();

        let again = retry_anchor(&state, &session, issued.id).await.unwrap();
        assert_eq!(again.tx_hash, issued.tx_hash);
        assert_eq!(again.cert_hash, issued.cert_hash);
    }

    #[tokio::test]
    async fn test_revoke_twice() {
        let (state, session, org) = setup().await;
        let issued = issue(&state, &session, request(org)).await.unwrap();

        let first = revoke(&state, &session, issued.id).await.unwrap();
        let second = revoke(&state, &session, issued.id).await.unwrap();
        assert!(first.revoked && second.revoked);
        assert_eq!(first.cert_hash, second.cert_hash);

        let hash = Fingerprint::parse(&issued.cert_hash).unwrap();
        let on_chain = state.ledger.attestation(&hash).await.unwrap().unwrap();
        assert!(on_chain.revoked);
    }

    #[tokio::test]
    async fn test_delete() {
        let (state, session, org) = setup().await;
        let issued = issue(&state, &session, request(org)).await.unwrap();

        delete(&state, &session, issued.id).await.unwrap();
        let err = delete(&state, &session, issued.id).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_lost_confirmation_is_adopted() {
        let ledger = Arc::new(LostConfirmationLedger::default());
        let (state, session, org) =
            setup_with(AppState::with_ledger(Config::default(), ledger.clone())).await;

        let issued = issue(&state, &session, request(org)).await.unwrap();
        assert_eq!(issued.tx_hash, UNKNOWN_TX_HASH);
        assert_eq!(ledger.submissions.load(Ordering::SeqCst), 1);

        let cert = state.db.certificates().find_by_id(issued.id).await.unwrap().unwrap();
        assert_eq!(cert.anchor_status, AnchorStatus::Anchored);
    }

    fn revoking_state(revoke_fails: bool) -> (AppState, Arc<RevokeDuringAnchorLedger>) {
        let db = Database::in_memory();
        let ledger = Arc::new(RevokeDuringAnchorLedger {
            db: db.clone(),
            inner: MemoryLedger::default(),
            revoke_fails,
        });
        let config = Config::default();
        let jwt = JwtKeys::random(config.token_ttl_minutes);
        (AppState::new(config, db, ledger.clone(), jwt), ledger)
    }

    #[tokio::test]
    async fn test_revocation_during_anchoring_reaches_chain() {
        let (state, ledger) = revoking_state(false);
        let (state, session, org) = setup_with(state).await;

        let issued = issue(&state, &session, request(org)).await.unwrap();

        let cert = state.db.certificates().find_by_id(issued.id).await.unwrap().unwrap();
        assert!(cert.revoked);
        assert_eq!(cert.anchor_status, AnchorStatus::Anchored);

        let hash = Fingerprint::parse(&issued.cert_hash).unwrap();
        let on_chain = ledger.inner.attestation(&hash).await.unwrap().unwrap();
        assert!(on_chain.revoked);
    }

    #[tokio::test]
    async fn test_unfinished_revocation_reopens_record() {
        let (state, _ledger) = revoking_state(true);
        let (state, session, org) = setup_with(state).await;

        let err = issue(&state, &session, request(org)).await.unwrap_err();
        assert!(matches!(err, ApiError::AnchorPending { .. }));

        let pending = state.db.certificates().list_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].revoked);
        assert!(pending[0].tx_hash.is_some());
    }
}
