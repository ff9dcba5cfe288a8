//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use certify_core::{Ledger, MemoryLedger, RetryPolicy};

use crate::auth::JwtKeys;
use crate::config::Config;
use crate::db::Database;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Storage backend (PostgreSQL or in-memory)
    pub db: Database,
    /// Certificate registry on chain
    pub ledger: Arc<dyn Ledger>,
    /// Access token keys
    pub jwt: Arc<JwtKeys>,
    /// Anchoring retry policy for issuance requests
    pub retry_policy: RetryPolicy,
}

impl AppState {
    pub fn new(config: Config, db: Database, ledger: Arc<dyn Ledger>, jwt: JwtKeys) -> Self {
        let retry_policy = config.retry_policy();
        Self {
            config: Arc::new(config),
            db,
            ledger,
            jwt: Arc::new(jwt),
            retry_policy,
        }
    }

    /// In-memory storage and ledger with a random token secret.
    pub fn in_memory(config: Config) -> Self {
        Self::with_ledger(config, Arc::new(MemoryLedger::default()))
    }

    /// In-memory storage with the given ledger.
    pub fn with_ledger(config: Config, ledger: Arc<dyn Ledger>) -> Self {
        let jwt = match config.jwt_secret.as_deref() {
            Some(secret) => JwtKeys::new(secret.as_bytes(), config.token_ttl_minutes),
            None => JwtKeys::random(config.token_ttl_minutes),
        };
        Self::new(config, Database::in_memory(), ledger, jwt)
    }
}
