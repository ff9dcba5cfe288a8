//! Database module for Certify Server
//!
//! Contains entities, repositories, and the storage backend selection.
//!
//! If `DATABASE_URL` is not set, falls back to in-memory tables (useful for
//! development and tests, but all data is lost on restart).

pub mod certificate;
pub mod organization;
pub mod user;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use crate::config::Config;

pub use certificate::{
    AnchorStatus, Certificate, CertificateListParams, CertificateRecord, CertificateRepository,
    NewCertificate,
};
pub use organization::{NewOrganization, Organization, OrganizationRepository};
pub use user::{NewUser, User, UserRepository, UserResponse};

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQL query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A unique constraint was violated
    #[error("{0}")]
    Conflict(String),
}

/// Map a unique violation onto [`StoreError::Conflict`].
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict(message.to_string())
        }
        _ => StoreError::Database(err),
    }
}

/// In-memory tables with unique indices, mirroring the PostgreSQL schema.
#[derive(Default)]
pub struct MemoryTables {
    pub(crate) organizations: DashMap<i64, Organization>,
    pub(crate) organization_names: DashMap<String, i64>,
    pub(crate) certificates: DashMap<i64, Certificate>,
    pub(crate) certificate_hashes: DashMap<String, i64>,
    pub(crate) users: DashMap<i64, User>,
    pub(crate) user_emails: DashMap<String, i64>,
    organization_seq: AtomicI64,
    certificate_seq: AtomicI64,
    user_seq: AtomicI64,
}

impl MemoryTables {
    pub(crate) fn next_organization_id(&self) -> i64 {
        self.organization_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn next_certificate_id(&self) -> i64 {
        self.certificate_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn next_user_id(&self) -> i64 {
        self.user_seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Storage backend
#[derive(Clone)]
pub enum Database {
    /// PostgreSQL storage (production)
    Postgres(PgPool),
    /// In-memory storage (development fallback)
    Memory(Arc<MemoryTables>),
}

impl Database {
    /// Connect to PostgreSQL and apply migrations.
    pub async fn connect(database_url: &str, config: &Config) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!(
            max_connections = config.database_max_connections,
            "Database connected and migrations applied"
        );

        Ok(Self::Postgres(pool))
    }

    /// Create in-memory storage (development only)
    pub fn in_memory() -> Self {
        Self::Memory(Arc::new(MemoryTables::default()))
    }

    /// Backend identifier for health output
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Cheap connectivity probe
    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            Self::Memory(_) => Ok(()),
        }
    }

    pub fn organizations(&self) -> OrganizationRepository {
        OrganizationRepository::new(self.clone())
    }

    pub fn certificates(&self) -> CertificateRepository {
        CertificateRepository::new(self.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.clone())
    }
}
