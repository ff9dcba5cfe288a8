//! Certify Server - REST API for blockchain-anchored certificates
//!
//! Exposes certify-core functionality via HTTP endpoints:
//! - POST /certificates/issue - Issue and anchor a certificate
//! - GET /certificates/verify/{hash} - Verify a certificate by fingerprint
//! - POST /certificates/verify-file - Verify a certificate document

use std::net::SocketAddr;
use std::sync::Arc;

use certify_core::{EvmLedger, Ledger, MemoryLedger};
use certify_server::{
    create_router_with_state, services::outbox, AppState, Config, Database, JwtKeys,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("certify_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();

    let db = match config.database_url.as_deref() {
        Some(url) => Database::connect(url, &config).await?,
        None => {
            tracing::warn!("DATABASE_URL not set: using in-memory storage (data is lost on restart)");
            Database::in_memory()
        }
    };

    let ledger: Arc<dyn Ledger> = match &config.chain {
        Some(chain) => {
            let ledger = EvmLedger::new(chain.ledger_config())?;
            tracing::info!(
                rpc_url = %chain.rpc_url,
                contract = %chain.contract_address,
                "Anchoring to EVM certificate registry"
            );
            Arc::new(ledger)
        }
        None => {
            tracing::warn!("CHAIN_RPC_URL not set: using in-memory ledger (attestations are lost on restart)");
            Arc::new(MemoryLedger::default())
        }
    };

    let jwt = match config.jwt_secret.as_deref() {
        Some(secret) => JwtKeys::new(secret.as_bytes(), config.token_ttl_minutes),
        None => {
            tracing::warn!("JWT_SECRET not set: using a random per-process secret (tokens do not survive restarts)");
            JwtKeys::random(config.token_ttl_minutes)
        }
    };

    if config.allow_registration {
        tracing::warn!("Open registration is enabled");
    }

    let addr = config.socket_addr();
    let state = AppState::new(config, db, ledger, jwt);

    let _outbox = outbox::spawn(state.clone());
    tracing::info!(
        interval_secs = state.config.outbox_interval_secs,
        "Anchoring outbox started"
    );

    let app = create_router_with_state(state);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), %addr, "Certify server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
