//! Ethereum JSON-RPC client for the certificate registry contract.
//!
//! Transactions are submitted with `eth_sendTransaction` from the issuer
//! account, which must be unlocked on (or managed by) the RPC node. Confirmation
//! is awaited by polling `eth_getTransactionReceipt` until the configured
//! timeout elapses.
//!
//! ## Features
//!
//! - Bounded confirmation wait; never blocks indefinitely
//! - Transient HTTP statuses classified as retryable
//! - Full observability with tracing instrumentation

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::abi::{self, ISSUE_SIGNATURE, REVOKE_SIGNATURE, VERIFY_SIGNATURE};
use super::{AnchorReceipt, Ledger, OnChainAttestation, RevocationOutcome};
use crate::error::{CertifyError, Result};
use crate::fingerprint::Fingerprint;

/// Default timeout for a single RPC request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time to wait for a transaction receipt.
const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// Receipt polling interval.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Gas limit sent with registry transactions (matches the original deployment).
const DEFAULT_GAS_LIMIT: u64 = 200_000;

/// Configuration for the EVM ledger client.
#[derive(Debug, Clone)]
pub struct EvmLedgerConfig {
    /// JSON-RPC endpoint URL
    pub rpc_url: String,
    /// Registry contract address
    pub contract_address: String,
    /// Issuer account used as transaction sender
    pub issuer_address: String,
    /// Timeout per RPC request
    pub request_timeout: Duration,
    /// Maximum wait for a transaction receipt
    pub confirm_timeout: Duration,
    /// Receipt polling interval
    pub poll_interval: Duration,
    /// Gas limit per transaction
    pub gas_limit: u64,
}

impl EvmLedgerConfig {
    pub fn new(
        rpc_url: impl Into<String>,
        contract_address: impl Into<String>,
        issuer_address: impl Into<String>,
    ) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address: contract_address.into(),
            issuer_address: issuer_address.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct TransactionReceipt {
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
    status: Option<String>,
}

/// Registry client over Ethereum JSON-RPC.
pub struct EvmLedger {
    client: Client,
    config: EvmLedgerConfig,
    next_id: AtomicU64,
}

impl EvmLedger {
    #[instrument(level = "debug", skip_all, fields(
        rpc_url = %config.rpc_url,
        contract = %config.contract_address
    ))]
    pub fn new(config: EvmLedgerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to create HTTP client");
                CertifyError::ChainUnavailable(format!("Failed to create HTTP client: {e}"))
            })?;

        info!("EVM ledger client created");
        Ok(Self {
            client,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &EvmLedgerConfig {
        &self.config
    }

    /// Check if an HTTP status code indicates a transient error.
    fn is_transient_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                | StatusCode::BAD_GATEWAY
        )
    }

    async fn rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("{method} returned HTTP {status}");
            return if Self::is_transient_status(status) {
                warn!(status = %status, method, "Transient RPC status");
                Err(CertifyError::ChainUnavailable(message))
            } else {
                warn!(status = %status, method, "Permanent RPC error");
                Err(CertifyError::ChainRejected(message))
            };
        }

        let envelope: RpcResponse<T> = response.json().await.map_err(|e| {
            CertifyError::SerializationError(format!("invalid {method} response: {e}"))
        })?;

        if let Some(err) = envelope.error {
            warn!(code = err.code, message = %err.message, method, "RPC error");
            return Err(CertifyError::ChainRejected(format!(
                "{method}: {} (code {})",
                err.message, err.code
            )));
        }

        Ok(envelope.result)
    }

    async fn send_transaction(&self, signature: &str, hash: &Fingerprint) -> Result<String> {
        let data = abi::encode_string_call(signature, &hash.to_hex());
        let tx = json!({
            "from": self.config.issuer_address,
            "to": self.config.contract_address,
            "gas": format!("0x{:x}", self.config.gas_limit),
            "data": abi::to_hex_data(&data),
        });

        self.rpc::<String>("eth_sendTransaction", json!([tx]))
            .await?
            .ok_or_else(|| {
                CertifyError::ChainRejected("eth_sendTransaction returned no hash".into())
            })
    }

    /// Poll for the receipt until it appears or `confirm_timeout` elapses.
    #[instrument(level = "debug", skip(self))]
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<AnchorReceipt> {
        let start = Instant::now();
        let wait = async {
            loop {
                let receipt: Option<TransactionReceipt> = self
                    .rpc("eth_getTransactionReceipt", json!([tx_hash]))
                    .await?;

                if let Some(receipt) = receipt {
                    return Self::into_anchor_receipt(receipt);
                }
                tokio::time::sleep(self.config.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.config.confirm_timeout, wait).await {
            Ok(result) => {
                debug!(
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Receipt received"
                );
                result
            }
            Err(_) => {
                warn!(tx_hash, "Timed out waiting for confirmation");
                Err(CertifyError::ChainTimeout(self.config.confirm_timeout))
            }
        }
    }

    fn into_anchor_receipt(receipt: TransactionReceipt) -> Result<AnchorReceipt> {
        if receipt.status.as_deref() == Some("0x0") {
            return Err(CertifyError::ChainRejected(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }
        let block_number = receipt
            .block_number
            .as_deref()
            .map(abi::parse_quantity)
            .transpose()?;

        Ok(AnchorReceipt {
            tx_hash: receipt.transaction_hash,
            block_number,
        })
    }
}

#[async_trait]
impl Ledger for EvmLedger {
    fn name(&self) -> &'static str {
        "evm"
    }

    #[instrument(level = "debug", skip(self), fields(cert_hash = %hash))]
    async fn anchor(&self, hash: &Fingerprint) -> Result<AnchorReceipt> {
        let tx_hash = self.send_transaction(ISSUE_SIGNATURE, hash).await?;
        info!(tx_hash = %tx_hash, "Issue transaction submitted");
        self.wait_for_receipt(&tx_hash).await
    }

    #[instrument(level = "debug", skip(self), fields(cert_hash = %hash))]
    async fn attestation(&self, hash: &Fingerprint) -> Result<Option<OnChainAttestation>> {
        let data = abi::encode_string_call(VERIFY_SIGNATURE, &hash.to_hex());
        let call = json!({
            "to": self.config.contract_address,
            "data": abi::to_hex_data(&data),
        });

        let raw: String = self
            .rpc("eth_call", json!([call, "latest"]))
            .await?
            .ok_or_else(|| CertifyError::SerializationError("eth_call returned null".into()))?;

        let output = abi::decode_verify_output(&abi::from_hex_data(&raw)?)?;
        if !output.exists {
            return Ok(None);
        }

        Ok(Some(OnChainAttestation {
            issuer_address: output.issuer,
            timestamp: output.timestamp,
            revoked: output.revoked,
        }))
    }

    #[instrument(level = "debug", skip(self), fields(cert_hash = %hash))]
    async fn revoke(&self, hash: &Fingerprint) -> Result<RevocationOutcome> {
        let current = self.attestation(hash).await?.ok_or_else(|| {
            CertifyError::NotFound(format!("certificate {hash} is not anchored on chain"))
        })?;

        if current.revoked {
            return Ok(RevocationOutcome::AlreadyRevoked);
        }

        let tx_hash = self.send_transaction(REVOKE_SIGNATURE, hash).await?;
        info!(tx_hash = %tx_hash, "Revoke transaction submitted");
        Ok(RevocationOutcome::Revoked(
            self.wait_for_receipt(&tx_hash).await?,
        ))
    }

    async fn health(&self) -> Result<()> {
        let block: Option<String> = self.rpc("eth_blockNumber", json!([])).await?;
        match block {
            Some(_) => Ok(()),
            None => Err(CertifyError::ChainUnavailable(
                "eth_blockNumber returned null".into(),
            )),
        }
    }
}
