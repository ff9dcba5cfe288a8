//! Example demonstrating anchoring with tracing instrumentation.
//!
//! Issues a canonical record, anchors it through the retry wrapper and
//! revokes it, all against the in-memory ledger.
//!
//! Run with: cargo run -p certify-core --example anchor_tracing

use certify_core::{
    anchor_with_retry, CanonicalRecord, CertificateDraft, Ledger, MemoryLedger, RetryPolicy,
};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::new("certify_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .init();

    println!("=== Certificate Anchoring Demo ===\n");

    let draft = CertificateDraft::new("Jane Doe", "Blockchain 101", 1);
    let record = match CanonicalRecord::issue(&draft, chrono::Utc::now()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Invalid draft: {}", e);
            return;
        }
    };

    let hash = match record.fingerprint() {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Failed to fingerprint: {}", e);
            return;
        }
    };
    println!("cert_hash: {}\n", hash);

    let ledger = MemoryLedger::default();
    match anchor_with_retry(&ledger, &hash, &RetryPolicy::default()).await {
        Ok(receipt) => println!("\nAnchored in tx {}", receipt.tx_hash),
        Err(e) => {
            println!("\nAnchoring failed: {}", e);
            return;
        }
    }

    match ledger.revoke(&hash).await {
        Ok(outcome) => println!("Revocation: {:?}", outcome),
        Err(e) => println!("Revocation failed: {}", e),
    }

    if let Ok(Some(attestation)) = ledger.attestation(&hash).await {
        println!(
            "Attestation: issuer={} revoked={}",
            attestation.issuer_address, attestation.revoked
        );
    }
}
