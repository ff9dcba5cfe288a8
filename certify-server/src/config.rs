//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::time::Duration;

use certify_core::{EvmLedgerConfig, RetryPolicy};

/// Chain connection settings. Present only when `CHAIN_RPC_URL` is set.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the chain node
    pub rpc_url: String,
    /// Certificate registry contract address
    pub contract_address: String,
    /// Issuer account used to send transactions
    pub issuer_address: String,
    /// Maximum wait for a transaction receipt in seconds (default: 60)
    pub confirm_timeout_secs: u64,
}

impl ChainConfig {
    pub fn ledger_config(&self) -> EvmLedgerConfig {
        let mut config = EvmLedgerConfig::new(
            self.rpc_url.clone(),
            self.contract_address.clone(),
            self.issuer_address.clone(),
        );
        config.confirm_timeout = Duration::from_secs(self.confirm_timeout_secs);
        config
    }
}

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 8000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 20)
    pub body_limit_mb: usize,
    /// Maximum file size per upload in MB (default: 10)
    pub max_file_size_mb: usize,
    /// Request timeout in seconds (default: 120, must exceed a full anchoring cycle)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL connection string; in-memory storage when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Database connection pool minimum connections (default: 2)
    pub database_min_connections: u32,
    /// HS256 signing secret for access tokens; random per process when unset
    pub jwt_secret: Option<String>,
    /// Access token lifetime in minutes (default: 60)
    pub token_ttl_minutes: i64,
    /// Allow open self-registration (default: true for tests, false when loaded from env)
    pub allow_registration: bool,
    /// Chain settings; in-memory ledger when unset
    pub chain: Option<ChainConfig>,
    /// Anchoring attempts per issuance request (default: 3)
    pub chain_max_retries: u32,
    /// Outbox sweep interval in seconds (default: 30)
    pub outbox_interval_secs: u64,
    /// Attempts before a pending certificate is marked failed (default: 10)
    pub outbox_max_attempts: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 20,
            max_file_size_mb: 10,
            timeout_secs: 120,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 20,
            database_min_connections: 2,
            jwt_secret: None,
            token_ttl_minutes: 60,
            allow_registration: true, // Enabled by default for tests; from_env() defaults to false
            chain: None,
            chain_max_retries: 3,
            outbox_interval_secs: 30,
            outbox_max_attempts: 10,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let allow_registration = std::env::var("ALLOW_REGISTRATION")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        let chain = env_nonempty("CHAIN_RPC_URL").map(|rpc_url| ChainConfig {
            rpc_url,
            contract_address: env_nonempty("CHAIN_CONTRACT_ADDRESS").unwrap_or_default(),
            issuer_address: env_nonempty("CHAIN_ISSUER_ADDRESS").unwrap_or_default(),
            confirm_timeout_secs: env_parse("CHAIN_CONFIRM_TIMEOUT_SECS", 60),
        });

        Self {
            port: env_parse("PORT", defaults.port),
            host,
            allowed_origins,
            body_limit_mb: env_parse("BODY_LIMIT_MB", defaults.body_limit_mb),
            max_file_size_mb: env_parse("MAX_FILE_SIZE_MB", defaults.max_file_size_mb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            database_url: env_nonempty("DATABASE_URL"),
            database_max_connections: env_parse(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            database_min_connections: env_parse(
                "DATABASE_MIN_CONNECTIONS",
                defaults.database_min_connections,
            ),
            jwt_secret: env_nonempty("JWT_SECRET"),
            token_ttl_minutes: env_parse("TOKEN_TTL_MINUTES", defaults.token_ttl_minutes),
            allow_registration,
            chain,
            chain_max_retries: env_parse("CHAIN_MAX_RETRIES", defaults.chain_max_retries),
            outbox_interval_secs: env_parse("OUTBOX_INTERVAL_SECS", defaults.outbox_interval_secs),
            outbox_max_attempts: env_parse("OUTBOX_MAX_ATTEMPTS", defaults.outbox_max_attempts),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Maximum accepted upload size in bytes
    pub fn max_file_size(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Retry policy for the anchoring step of one request.
    ///
    /// The deadline ends retries before the request timeout so the handler
    /// can still record the outcome and answer `ANCHOR_PENDING`.
    pub fn retry_policy(&self) -> RetryPolicy {
        let confirm = self
            .chain
            .as_ref()
            .map(|c| c.confirm_timeout_secs)
            .unwrap_or(60);

        let request = Duration::from_secs(self.timeout_secs.max(1));
        let deadline = request
            .saturating_sub(Duration::from_secs(10))
            .max(request / 2);

        RetryPolicy {
            max_attempts: self.chain_max_retries.max(1),
            attempt_timeout: Duration::from_secs(confirm + 5),
            deadline: Some(deadline),
            ..RetryPolicy::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert!(config.database_url.is_none());
        assert!(config.chain.is_none());
        assert!(config.allow_registration);
        assert!(!config.rate_limit_enabled);
    }

    #[test]
    fn test_retry_policy_uses_chain_timeout() {
        let config = Config {
            chain: Some(ChainConfig {
                rpc_url: "http://localhost:8545".into(),
                contract_address: "0xcontract".into(),
                issuer_address: "0xissuer".into(),
                confirm_timeout_secs: 20,
            }),
            chain_max_retries: 0,
            ..Config::default()
        };

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(25));

        let ledger = config.chain.as_ref().unwrap().ledger_config();
        assert_eq!(ledger.confirm_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_retry_deadline_fits_inside_request_timeout() {
        let policy = Config::default().retry_policy();
        assert_eq!(policy.deadline, Some(Duration::from_secs(110)));
        // Three 65 s attempts would overrun the 120 s request timeout
        assert!(policy.attempt_timeout * policy.max_attempts > Duration::from_secs(120));

        let short = Config {
            timeout_secs: 8,
            ..Config::default()
        };
        assert_eq!(short.retry_policy().deadline, Some(Duration::from_secs(4)));
    }

    #[test]
    fn test_max_file_size() {
        let config = Config {
            max_file_size_mb: 3,
            ..Config::default()
        };
        assert_eq!(config.max_file_size(), 3 * 1024 * 1024);
    }
}
