//! Certify CLI - fingerprint and verify blockchain-anchored certificates.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success (certificate valid)
  1   General error
  64  Invalid argument
  65  Verification failed (unknown, revoked or unanchored certificate)
  66  Cannot read input file
  69  Certificate API unavailable";

#[derive(Parser)]
#[command(name = "certify")]
#[command(author, version, about = "Blockchain-anchored certificate verification", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Only print the essential result (hash or status)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the SHA-256 fingerprint (cert_hash) of a certificate document
    Fingerprint {
        /// Path to the certificate document
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the canonical certificate document and its fingerprint
    Canonical {
        /// Certificate holder
        #[arg(long)]
        owner: String,

        /// Course or achievement
        #[arg(long)]
        course: String,

        /// Issuing organization id
        #[arg(long)]
        org: i64,

        /// Issuance time (RFC 3339, defaults to now)
        #[arg(long)]
        issued_at: Option<String>,

        /// Nonce as 32 hex characters (defaults to random)
        #[arg(long)]
        nonce: Option<String>,

        /// Write the document to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Verify a certificate by hash or document against the certificate API
    Verify {
        /// 64-character hex cert_hash, or path to a certificate document
        #[arg(value_name = "HASH|FILE")]
        target: String,

        /// Base URL of the certificate API
        #[arg(long, env = "CERTIFY_API_URL", default_value = "http://localhost:8000")]
        api: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("Error: {message}");
    }
    std::process::exit(exit.code);
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Fingerprint { file } => commands::fingerprint::execute(file, cli.quiet),
        Commands::Canonical {
            owner,
            course,
            org,
            issued_at,
            nonce,
            output,
        } => commands::canonical::execute(
            commands::canonical::CanonicalArgs {
                owner,
                course,
                org,
                issued_at,
                nonce,
                output,
            },
            cli.quiet,
        ),
        Commands::Verify { target, api } => commands::verify::execute(target, api, cli.quiet).await,
    }
}
