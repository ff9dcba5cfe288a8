//! Background anchoring of pending certificates
//!
//! A single task sweeps `pending` records on a fixed interval and retries
//! their chain step one attempt at a time. After `outbox_max_attempts`
//! attempts, or on a permanent chain error, a record is marked `failed`.
//! Records revoked before their anchor landed are revoked on chain here too.

use std::time::Duration;

use certify_core::RetryPolicy;
use tokio::task::JoinHandle;

use super::issuance::{finish_anchor, resume_anchor};
use crate::error::ApiError;
use crate::state::AppState;

/// Records examined per sweep
const BATCH_SIZE: i64 = 50;

/// Counts from one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub anchored: usize,
    pub still_pending: usize,
    pub failed: usize,
}

/// Spawn the outbox worker on the current runtime.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_secs(state.config.outbox_interval_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match sweep(&state).await {
                Ok(report) if report == SweepReport::default() => {}
                Ok(report) => tracing::info!(
                    anchored = report.anchored,
                    still_pending = report.still_pending,
                    failed = report.failed,
                    "Outbox sweep finished"
                ),
                Err(e) => tracing::error!(error = %e, "Outbox sweep failed"),
            }
        }
    })
}

/// Run one sweep over the pending records.
pub async fn sweep(state: &AppState) -> Result<SweepReport, ApiError> {
    let certs = state.db.certificates();
    let pending = certs.list_pending(BATCH_SIZE).await?;
    let policy = RetryPolicy::single_attempt(state.retry_policy.attempt_timeout);
    let max_attempts = state.config.outbox_max_attempts.max(1);

    let mut report = SweepReport::default();

    for cert in pending {
        match resume_anchor(state, &cert, &policy).await {
            Ok(tx_hash) => match finish_anchor(state, &cert, &tx_hash).await {
                Ok(_) => {
                    tracing::info!(
                        certificate_id = cert.id,
                        tx_hash = %tx_hash,
                        "Pending certificate anchored"
                    );
                    report.anchored += 1;
                }
                Err(ApiError::AnchorPending { .. }) => report.still_pending += 1,
                Err(ApiError::NotFound(_)) => {
                    tracing::debug!(certificate_id = cert.id, "Certificate deleted during sweep");
                }
                Err(e) => return Err(e),
            },
            Err(e) if e.is_retryable() && cert.anchor_attempts + 1 < max_attempts => {
                certs.record_anchor_failure(cert.id, &e.to_string()).await?;
                report.still_pending += 1;
            }
            Err(e) => {
                certs.mark_failed(cert.id, &e.to_string()).await?;
                tracing::warn!(
                    certificate_id = cert.id,
                    attempts = cert.anchor_attempts + 1,
                    error = %e,
                    "Giving up on anchoring certificate"
                );
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use certify_core::{
        AnchorReceipt, CertifyError, Fingerprint, Ledger, MemoryLedger, OnChainAttestation,
        RevocationOutcome,
    };
    use chrono::Utc;

    use crate::config::Config;
    use crate::db::{AnchorStatus, NewCertificate};

    /// Ledger that is offline until switched on.
    #[derive(Default)]
    struct SwitchableLedger {
        online: AtomicBool,
        inner: MemoryLedger,
    }

    impl SwitchableLedger {
        fn check(&self) -> certify_core::Result<()> {
            if self.online.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(CertifyError::ChainUnavailable("node offline".into()))
            }
        }
    }

    #[async_trait]
    impl Ledger for SwitchableLedger {
        fn name(&self) -> &'static str {
            "switchable"
        }

        async fn anchor(&self, hash: &Fingerprint) -> certify_core::Result<AnchorReceipt> {
            self.check()?;
            self.inner.anchor(hash).await
        }

        async fn attestation(
            &self,
            hash: &Fingerprint,
        ) -> certify_core::Result<Option<OnChainAttestation>> {
            self.check()?;
            self.inner.attestation(hash).await
        }

        async fn revoke(&self, hash: &Fingerprint) -> certify_core::Result<RevocationOutcome> {
            self.check()?;
            self.inner.revoke(hash).await
        }

        async fn health(&self) -> certify_core::Result<()> {
            self.check()
        }
    }

    async fn pending_state(max_attempts: i32) -> (AppState, Arc<SwitchableLedger>, i64) {
        let ledger = Arc::new(SwitchableLedger::default());
        let config = Config {
            outbox_max_attempts: max_attempts,
            ..Config::default()
        };
        let state = AppState::with_ledger(config, ledger.clone());
        let cert = state
            .db
            .certificates()
            .create(NewCertificate {
                cert_hash: Fingerprint::of_bytes(b"doc").to_hex(),
                owner_name: "Jane Doe".into(),
                course_name: "Blockchain 101".into(),
                organization_id: 1,
                document: b"doc".to_vec(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        (state, ledger, cert.id)
    }

    #[tokio::test]
    async fn test_sweep_anchors_once_chain_returns() {
        let (state, ledger, id) = pending_state(10).await;

        let report = sweep(&state).await.unwrap();
        assert_eq!(report.still_pending, 1);

        ledger.online.store(true, Ordering::SeqCst);
        let report = sweep(&state).await.unwrap();
        assert_eq!(report.anchored, 1);

        let cert = state.db.certificates().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(cert.anchor_status, AnchorStatus::Anchored);
        assert_eq!(cert.anchor_attempts, 2);

        // Nothing left to do
        assert_eq!(sweep(&state).await.unwrap(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_gives_up_after_max_attempts() {
        let (state, _ledger, id) = pending_state(2).await;

        assert_eq!(sweep(&state).await.unwrap().still_pending, 1);
        assert_eq!(sweep(&state).await.unwrap().failed, 1);

        let cert = state.db.certificates().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(cert.anchor_status, AnchorStatus::Failed);
        assert!(cert.last_anchor_error.unwrap().contains("node offline"));
    }

    #[tokio::test]
    async fn test_sweep_adopts_existing_attestation() {
        let (state, ledger, id) = pending_state(10).await;
        ledger.online.store(true, Ordering::SeqCst);
        ledger
            .inner
            .anchor(&Fingerprint::of_bytes(b"doc"))
            .await
            .unwrap();

        assert_eq!(sweep(&state).await.unwrap().anchored, 1);
        let cert = state.db.certificates().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(cert.anchor_status, AnchorStatus::Anchored);
        assert_eq!(ledger.inner.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_carries_revocation_to_chain() {
        let (state, ledger, id) = pending_state(10).await;
        state.db.certificates().mark_revoked(id).await.unwrap();

        ledger.online.store(true, Ordering::SeqCst);
        assert_eq!(sweep(&state).await.unwrap().anchored, 1);

        let cert = state.db.certificates().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(cert.anchor_status, AnchorStatus::Anchored);
        assert!(cert.revoked);

        let on_chain = ledger
            .inner
            .attestation(&Fingerprint::of_bytes(b"doc"))
            .await
            .unwrap()
            .unwrap();
        assert!(on_chain.revoked);
    }

    #[tokio::test]
    async fn test_sweep_finishes_reopened_revocation() {
        let (state, ledger, id) = pending_state(10).await;
        let hash = Fingerprint::of_bytes(b"doc");
        let certs = state.db.certificates();

        // Anchored earlier, revocation still owed on chain
        let receipt = ledger.inner.anchor(&hash).await.unwrap();
        certs.mark_anchored(id, &receipt.tx_hash).await.unwrap();
        certs.mark_revoked(id).await.unwrap();
        certs.reopen_anchor(id, "revocation not yet on chain").await.unwrap();

        ledger.online.store(true, Ordering::SeqCst);
        assert_eq!(sweep(&state).await.unwrap().anchored, 1);

        let cert = certs.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(cert.anchor_status, AnchorStatus::Anchored);
        assert_eq!(cert.tx_hash, Some(receipt.tx_hash));
        assert!(ledger.inner.attestation(&hash).await.unwrap().unwrap().revoked);
        assert_eq!(ledger.inner.len(), 1);
    }
}
