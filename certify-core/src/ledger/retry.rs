//! Bounded retry for anchoring transactions.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::{future::retry_notify, ExponentialBackoff};
use tracing::{debug, info, warn};

use super::{AnchorReceipt, Ledger};
use crate::error::{CertifyError, Result};
use crate::fingerprint::Fingerprint;

/// Retry configuration for a single issuance.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Initial backoff interval
    pub initial_interval: Duration,
    /// Maximum backoff interval
    pub max_interval: Duration,
    /// Upper bound for one anchoring attempt, confirmation included
    pub attempt_timeout: Duration,
    /// Upper bound for all attempts and backoff together
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(60),
            deadline: None,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn single_attempt(attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            attempt_timeout,
            ..Default::default()
        }
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            // Attempts are bounded by `max_attempts`, not wall time.
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Look for an attestation that an earlier submission already created.
async fn existing_attestation(ledger: &dyn Ledger, hash: &Fingerprint) -> bool {
    match ledger.attestation(hash).await {
        Ok(found) => found.is_some(),
        Err(err) => {
            debug!(cert_hash = %hash, error = %err, "Attestation lookup failed");
            false
        }
    }
}

/// One attempt: adopt an attestation that is already on chain, else submit.
async fn attempt_anchor(ledger: &dyn Ledger, hash: &Fingerprint) -> Result<AnchorReceipt> {
    if existing_attestation(ledger, hash).await {
        warn!(
            cert_hash = %hash,
            ledger = ledger.name(),
            "Attestation already on chain, adopting it"
        );
        return Ok(AnchorReceipt::adopted());
    }
    ledger.anchor(hash).await
}

/// Anchor `hash`, retrying transient failures up to `policy.max_attempts`.
///
/// Every attempt first checks whether the hash is already attested, so a
/// submission whose confirmation was lost is adopted instead of resubmitted;
/// adopted receipts carry [`UNKNOWN_TX_HASH`](super::UNKNOWN_TX_HASH).
/// Each attempt is bounded by `policy.attempt_timeout` and counts as
/// transient when it expires. The whole run is bounded by `policy.deadline`
/// when set. Permanent errors are returned immediately.
pub async fn anchor_with_retry(
    ledger: &dyn Ledger,
    hash: &Fingerprint,
    policy: &RetryPolicy,
) -> Result<AnchorReceipt> {
    let attempts = AtomicU32::new(0);
    let max_attempts = policy.max_attempts.max(1);

    let run = retry_notify(
        policy.build_backoff(),
        || {
            let attempts = &attempts;
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                let outcome = match tokio::time::timeout(
                    policy.attempt_timeout,
                    attempt_anchor(ledger, hash),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(CertifyError::ChainTimeout(policy.attempt_timeout)),
                };

                match outcome {
                    Ok(receipt) => Ok(receipt),
                    Err(err) if err.is_retryable() && attempt < max_attempts => {
                        Err(backoff::Error::transient(err))
                    }
                    // A rejection after an unconfirmed submission may be the
                    // chain refusing a duplicate of our own transaction.
                    Err(err) if attempt > 1 => {
                        if existing_attestation(ledger, hash).await {
                            warn!(
                                cert_hash = %hash,
                                error = %err,
                                "Attestation landed after an unconfirmed attempt, adopting it"
                            );
                            Ok(AnchorReceipt::adopted())
                        } else {
                            Err(backoff::Error::permanent(err))
                        }
                    }
                    Err(err) => Err(backoff::Error::permanent(err)),
                }
            }
        },
        |err: CertifyError, duration: Duration| {
            warn!(
                cert_hash = %hash,
                ledger = ledger.name(),
                error = %err,
                retry_after_ms = duration.as_millis() as u64,
                "Anchor attempt failed, retry scheduled"
            );
        },
    );

    let result = match policy.deadline {
        Some(deadline) => match tokio::time::timeout(deadline, run).await {
            Ok(result) => result,
            Err(_) => Err(CertifyError::ChainTimeout(deadline)),
        },
        None => run.await,
    };

    let made = attempts.load(Ordering::SeqCst);
    match &result {
        Ok(receipt) => info!(
            cert_hash = %hash,
            tx_hash = %receipt.tx_hash,
            attempts = made,
            "Certificate anchored"
        ),
        Err(err) => warn!(
            cert_hash = %hash,
            error = %err,
            attempts = made,
            "Anchoring gave up"
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MemoryLedger, OnChainAttestation, RevocationOutcome};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// Fails the first `failures` anchors with `error`, then delegates.
    struct FlakyLedger {
        inner: MemoryLedger,
        failures: u32,
        permanent: bool,
        calls: AtomicU32,
    }

    impl FlakyLedger {
        fn new(failures: u32, permanent: bool) -> Self {
            Self {
                inner: MemoryLedger::default(),
                failures,
                permanent,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Ledger for FlakyLedger {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn anchor(&self, hash: &Fingerprint) -> Result<AnchorReceipt> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(if self.permanent {
                    CertifyError::ChainRejected("execution reverted".into())
                } else {
                    CertifyError::ChainUnavailable("node offline".into())
                });
            }
            self.inner.anchor(hash).await
        }

        async fn attestation(&self, hash: &Fingerprint) -> Result<Option<OnChainAttestation>> {
            self.inner.attestation(hash).await
        }

        async fn revoke(&self, hash: &Fingerprint) -> Result<RevocationOutcome> {
            self.inner.revoke(hash).await
        }

        async fn health(&self) -> Result<()> {
            Ok(())
        }
    }

    struct StalledLedger;

    #[async_trait]
    impl Ledger for StalledLedger {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn anchor(&self, _hash: &Fingerprint) -> Result<AnchorReceipt> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("attempt timeout must fire first")
        }

        async fn attestation(&self, _hash: &Fingerprint) -> Result<Option<OnChainAttestation>> {
            Ok(None)
        }

        async fn revoke(&self, _hash: &Fingerprint) -> Result<RevocationOutcome> {
            Ok(RevocationOutcome::AlreadyRevoked)
        }

        async fn health(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Commits the first submission but reports it as timed out.
    struct LostConfirmationLedger {
        inner: MemoryLedger,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Ledger for LostConfirmationLedger {
        fn name(&self) -> &'static str {
            "lost-confirmation"
        }

        async fn anchor(&self, hash: &Fingerprint) -> Result<AnchorReceipt> {
            let receipt = self.inner.anchor(hash).await?;
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(CertifyError::ChainTimeout(Duration::from_secs(60)));
            }
            Ok(receipt)
        }

        async fn attestation(&self, hash: &Fingerprint) -> Result<Option<OnChainAttestation>> {
            self.inner.attestation(hash).await
        }

        async fn revoke(&self, hash: &Fingerprint) -> Result<RevocationOutcome> {
            self.inner.revoke(hash).await
        }

        async fn health(&self) -> Result<()> {
            Ok(())
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            attempt_timeout: Duration::from_millis(200),
            deadline: None,
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let ledger = FlakyLedger::new(2, false);
        let hash = Fingerprint::of_bytes(b"cert");

        let receipt = anchor_with_retry(&ledger, &hash, &fast_policy(3)).await.unwrap();
        assert!(receipt.tx_hash.starts_with("0x"));
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let ledger = FlakyLedger::new(10, false);
        let hash = Fingerprint::of_bytes(b"cert");

        let err = anchor_with_retry(&ledger, &hash, &fast_policy(3))
            .await
            .unwrap_err();
        assert!(matches!(err, CertifyError::ChainUnavailable(_)));
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let ledger = FlakyLedger::new(1, true);
        let hash = Fingerprint::of_bytes(b"cert");

        let err = anchor_with_retry(&ledger, &hash, &fast_policy(5))
            .await
            .unwrap_err();
        assert!(matches!(err, CertifyError::ChainRejected(_)));
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stalled_attempt_times_out() {
        let hash = Fingerprint::of_bytes(b"cert");
        let err = anchor_with_retry(&StalledLedger, &hash, &fast_policy(2))
            .await
            .unwrap_err();
        assert!(matches!(err, CertifyError::ChainTimeout(_)));
    }

    #[tokio::test]
    async fn test_lost_confirmation_is_adopted_not_resubmitted() {
        let ledger = LostConfirmationLedger {
            inner: MemoryLedger::default(),
            calls: AtomicU32::new(0),
        };
        let hash = Fingerprint::of_bytes(b"cert");

        let receipt = anchor_with_retry(&ledger, &hash, &fast_policy(3)).await.unwrap();
        assert!(receipt.is_adopted());
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 1);
        assert!(ledger.inner.attestation(&hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_already_attested_hash_is_adopted() {
        let ledger = FlakyLedger::new(0, false);
        let hash = Fingerprint::of_bytes(b"cert");
        ledger.inner.anchor(&hash).await.unwrap();

        let receipt = anchor_with_retry(&ledger, &hash, &fast_policy(1)).await.unwrap();
        assert_eq!(receipt, AnchorReceipt::adopted());
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_all_attempts() {
        let hash = Fingerprint::of_bytes(b"cert");
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(60),
            deadline: Some(Duration::from_secs(90)),
        };

        let started = tokio::time::Instant::now();
        let err = anchor_with_retry(&StalledLedger, &hash, &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, CertifyError::ChainTimeout(d) if d == Duration::from_secs(90)));
        assert!(started.elapsed() < Duration::from_secs(91));
    }
}
