//! Verify command - ask the certificate API about a hash or document.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use certify_core::Fingerprint;
use colored::Colorize;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::exit_codes::{INVALID_ARGUMENT, UNAVAILABLE, VERIFICATION};
use crate::utils::{fingerprint_file, format_timestamp};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct VerificationReport {
    local_record: LocalRecord,
    on_chain: Option<OnChainRecord>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct LocalRecord {
    id: i64,
    owner_name: String,
    course_name: String,
    organization_id: i64,
    created_at: String,
    tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OnChainRecord {
    issuer_address: String,
    timestamp: u64,
    revoked: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Resolve the target: an existing path is fingerprinted, anything else must be a hash.
fn resolve_target(target: &str) -> Result<Fingerprint> {
    let path = Path::new(target);
    if path.is_file() {
        return fingerprint_file(path);
    }

    Fingerprint::parse(target).map_err(|e| {
        anyhow!("{INVALID_ARGUMENT}: '{target}' is neither a readable file nor a certificate hash ({e})")
    })
}

/// Execute the verify command.
pub async fn execute(target: String, api: String, quiet: bool) -> Result<()> {
    let hash = resolve_target(&target)?;
    let url = format!(
        "{}/certificates/verify/{}",
        api.trim_end_matches('/'),
        hash
    );
    debug!(%url, "Querying certificate API");

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| anyhow!("{UNAVAILABLE}: {api} ({e})"))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response
            .json::<ErrorBody>()
            .await
            .map(|b| b.detail)
            .unwrap_or_else(|_| status.to_string());

        return Err(match status {
            StatusCode::NOT_FOUND => {
                print_banner("NOT FOUND", false, quiet);
                anyhow!("{VERIFICATION}: {detail}")
            }
            StatusCode::BAD_REQUEST => anyhow!("{INVALID_ARGUMENT}: {detail}"),
            s if s.is_server_error() => anyhow!("{UNAVAILABLE}: {detail}"),
            _ => anyhow!("Unexpected response {status}: {detail}"),
        });
    }

    let report: VerificationReport = response
        .json()
        .await
        .context("Failed to parse verification response")?;

    info!(
        hash = %hash,
        status = %report.status,
        certificate_id = report.local_record.id,
        "Verification complete"
    );

    match report.status.as_str() {
        "valid" => {
            print_banner("VALID", true, quiet);
            print_report(&hash, &report, quiet);
            Ok(())
        }
        "revoked" => {
            print_banner("REVOKED", false, quiet);
            print_report(&hash, &report, quiet);
            bail!("{VERIFICATION}: certificate has been revoked")
        }
        "pending_anchor" => {
            print_banner("NOT ANCHORED", false, quiet);
            print_report(&hash, &report, quiet);
            bail!("{VERIFICATION}: certificate is not yet anchored on chain")
        }
        "chain_mismatch" => {
            print_banner("CHAIN MISMATCH", false, quiet);
            print_report(&hash, &report, quiet);
            bail!("{VERIFICATION}: no on-chain attestation for this certificate")
        }
        "chain_unavailable" => {
            warn!("Chain unavailable; only the local record was checked");
            print_report(&hash, &report, quiet);
            bail!("{UNAVAILABLE}: blockchain could not be queried")
        }
        other => bail!("Unexpected verification status: {other}"),
    }
}

fn print_banner(label: &str, ok: bool, quiet: bool) {
    if quiet {
        println!("{}", label.to_lowercase().replace(' ', "_"));
        return;
    }

    let line = "════════════════════════════════════════";
    let text = format!("║{:^40}║", label);
    println!();
    if ok {
        println!("{}", format!("╔{line}╗").green());
        println!("{}", text.green().bold());
        println!("{}", format!("╚{line}╝").green());
    } else {
        println!("{}", format!("╔{line}╗").red());
        println!("{}", text.red().bold());
        println!("{}", format!("╚{line}╝").red());
    }
}

fn print_report(hash: &Fingerprint, report: &VerificationReport, quiet: bool) {
    if quiet {
        return;
    }

    let record = &report.local_record;
    println!();
    println!("   {} {}", "cert_hash:".dimmed(), hash);
    println!("   {} {}", "Owner:".dimmed(), record.owner_name);
    println!("   {} {}", "Course:".dimmed(), record.course_name);
    println!("   {} {}", "Organization:".dimmed(), record.organization_id);
    println!("   {} {}", "Issued at:".dimmed(), record.created_at);
    if let Some(tx) = &record.tx_hash {
        println!("   {} {}", "Transaction:".dimmed(), tx);
    }

    match &report.on_chain {
        Some(chain) => {
            println!("   {} {}", "Issuer:".dimmed(), chain.issuer_address);
            println!(
                "   {} {}",
                "Anchored at:".dimmed(),
                format_timestamp(chain.timestamp)
            );
            let revoked = if chain.revoked {
                "yes".red()
            } else {
                "no".green()
            };
            println!("   {} {}", "Revoked on chain:".dimmed(), revoked);
        }
        None => println!("   {} {}", "On chain:".dimmed(), "no attestation".yellow()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target_accepts_hash() {
        let hex = "ab".repeat(32);
        assert_eq!(resolve_target(&hex).unwrap().to_hex(), hex);
    }

    #[test]
    fn test_resolve_target_rejects_garbage() {
        let err = resolve_target("definitely-not-here.json").unwrap_err();
        assert!(err.to_string().starts_with(INVALID_ARGUMENT));
    }

    #[test]
    fn test_report_deserializes_server_shape() {
        let body = serde_json::json!({
            "local_record": {
                "id": 1,
                "owner_name": "Jane Doe",
                "course_name": "Blockchain 101",
                "organization_id": 1,
                "created_at": "2024-01-15T12:30:45.000Z",
                "cert_hash": "ab".repeat(32),
                "revoked": false,
                "tx_hash": "0xdeadbeef",
                "anchor_status": "anchored"
            },
            "on_chain": {
                "issuer_address": "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1",
                "timestamp": 1705321845,
                "revoked": false
            },
            "status": "valid"
        });

        let report: VerificationReport = serde_json::from_value(body).unwrap();
        assert_eq!(report.status, "valid");
        assert_eq!(report.local_record.owner_name, "Jane Doe");
        assert!(!report.on_chain.unwrap().revoked);
    }
}
