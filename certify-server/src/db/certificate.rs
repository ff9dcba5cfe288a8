//! Certificate entity and repository
//!
//! A certificate row holds the canonical document, its fingerprint and the
//! bookkeeping for the chain anchoring step. Everything except `revoked` and
//! the anchor fields is immutable after creation.

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::{conflict_on_unique, Database, StoreError};

const DUPLICATE_HASH: &str = "Certificate with this hash already exists";

/// Maximum page size for certificate listings
pub const MAX_PAGE_SIZE: i64 = 100;

/// Anchoring state of a certificate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnchorStatus {
    /// Stored locally, chain transaction not yet confirmed
    #[default]
    Pending,
    /// Confirmed on chain
    Anchored,
    /// Chain permanently rejected the transaction or retries were exhausted
    Failed,
}

impl AnchorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Anchored => "anchored",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for AnchorStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "anchored" => Self::Anchored,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Certificate entity from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Certificate {
    pub id: i64,
    pub cert_hash: String,
    pub owner_name: String,
    pub course_name: String,
    pub organization_id: i64,
    pub document: Vec<u8>,
    pub tx_hash: Option<String>,
    #[sqlx(try_from = "String")]
    pub anchor_status: AnchorStatus,
    pub anchor_attempts: i32,
    pub last_anchor_error: Option<String>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub anchored_at: Option<DateTime<Utc>>,
}

/// DTO for creating a new certificate
#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub cert_hash: String,
    pub owner_name: String,
    pub course_name: String,
    pub organization_id: i64,
    pub document: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Certificate response DTO for API responses (excludes the document bytes)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CertificateRecord {
    /// Certificate identifier
    #[schema(example = 1)]
    pub id: i64,
    /// Certificate holder
    #[schema(example = "Jane Doe")]
    pub owner_name: String,
    /// Course or achievement
    #[schema(example = "Blockchain 101")]
    pub course_name: String,
    /// Issuing organization
    #[schema(example = 1)]
    pub organization_id: i64,
    /// Issuance timestamp (equals the document's `issued_at`)
    #[schema(value_type = String, example = "2026-01-08T10:00:00.000Z")]
    pub created_at: DateTime<Utc>,
    /// SHA-256 of the canonical document, 64 lowercase hex characters
    #[schema(example = "2903b5439103f0282f8e8f6ece03ff60c4b4461256d9507a8bab955193ced5b0")]
    pub cert_hash: String,
    /// Local revocation flag
    pub revoked: bool,
    /// Anchoring transaction hash
    pub tx_hash: Option<String>,
    /// Anchoring state
    pub anchor_status: AnchorStatus,
}

impl From<Certificate> for CertificateRecord {
    fn from(cert: Certificate) -> Self {
        Self {
            id: cert.id,
            owner_name: cert.owner_name,
            course_name: cert.course_name,
            organization_id: cert.organization_id,
            created_at: cert.created_at,
            cert_hash: cert.cert_hash,
            revoked: cert.revoked,
            tx_hash: cert.tx_hash,
            anchor_status: cert.anchor_status,
        }
    }
}

/// Listing parameters
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct CertificateListParams {
    /// Restrict to one organization
    #[serde(default)]
    pub org_id: Option<i64>,

    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,

    /// Items per page (max 100)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Default for CertificateListParams {
    fn default() -> Self {
        Self {
            org_id: None,
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl CertificateListParams {
    fn limit_offset(&self) -> (i64, i64) {
        let limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        let offset = (self.page - 1).max(0) * limit;
        (limit, offset)
    }
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

const COLUMNS: &str = "id, cert_hash, owner_name, course_name, organization_id, document, \
    tx_hash, anchor_status, anchor_attempts, last_anchor_error, revoked, created_at, anchored_at";

/// Repository for certificate operations
#[derive(Clone)]
pub struct CertificateRepository {
    db: Database,
}

impl CertificateRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new certificate in the `pending` state.
    pub async fn create(&self, input: NewCertificate) -> Result<Certificate, StoreError> {
        match &self.db {
            Database::Postgres(pool) => sqlx::query_as::<_, Certificate>(&format!(
                r#"
                INSERT INTO certificates (
                    cert_hash, owner_name, course_name, organization_id, document, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {COLUMNS}
                "#
            ))
            .bind(&input.cert_hash)
            .bind(&input.owner_name)
            .bind(&input.course_name)
            .bind(input.organization_id)
            .bind(&input.document)
            .bind(input.created_at)
            .fetch_one(pool)
            .await
            .map_err(|e| conflict_on_unique(e, DUPLICATE_HASH)),

            Database::Memory(tables) => {
                match tables.certificate_hashes.entry(input.cert_hash.clone()) {
                    Entry::Occupied(_) => Err(StoreError::Conflict(DUPLICATE_HASH.to_string())),
                    Entry::Vacant(slot) => {
                        let cert = Certificate {
                            id: tables.next_certificate_id(),
                            cert_hash: input.cert_hash,
                            owner_name: input.owner_name,
                            course_name: input.course_name,
                            organization_id: input.organization_id,
                            document: input.document,
                            tx_hash: None,
                            anchor_status: AnchorStatus::Pending,
                            anchor_attempts: 0,
                            last_anchor_error: None,
                            revoked: false,
                            created_at: input.created_at,
                            anchored_at: None,
                        };
                        slot.insert(cert.id);
                        tables.certificates.insert(cert.id, cert.clone());
                        Ok(cert)
                    }
                }
            }
        }
    }

    /// Find certificate by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Certificate>, StoreError> {
        match &self.db {
            Database::Postgres(pool) => Ok(sqlx::query_as::<_, Certificate>(&format!(
                "SELECT {COLUMNS} FROM certificates WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(pool)
            .await?),

            Database::Memory(tables) => Ok(tables.certificates.get(&id).map(|c| c.clone())),
        }
    }

    /// Find certificate by fingerprint (lowercase hex)
    pub async fn find_by_hash(&self, cert_hash: &str) -> Result<Option<Certificate>, StoreError> {
        match &self.db {
            Database::Postgres(pool) => Ok(sqlx::query_as::<_, Certificate>(&format!(
                "SELECT {COLUMNS} FROM certificates WHERE cert_hash = $1"
            ))
            .bind(cert_hash)
            .fetch_optional(pool)
            .await?),

            Database::Memory(tables) => Ok(tables
                .certificate_hashes
                .get(cert_hash)
                .and_then(|id| tables.certificates.get(&*id).map(|c| c.clone()))),
        }
    }

    /// List certificates, newest first, optionally restricted to one organization
    pub async fn list(
        &self,
        params: &CertificateListParams,
    ) -> Result<Vec<Certificate>, StoreError> {
        let (limit, offset) = params.limit_offset();

        match &self.db {
            Database::Postgres(pool) => {
                let certs = if let Some(org_id) = params.org_id {
                    sqlx::query_as::<_, Certificate>(&format!(
                        r#"
                        SELECT {COLUMNS} FROM certificates
                        WHERE organization_id = $1
                        ORDER BY created_at DESC, id DESC
                        LIMIT $2 OFFSET $3
                        "#
                    ))
                    .bind(org_id)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await?
                } else {
                    sqlx::query_as::<_, Certificate>(&format!(
                        r#"
                        SELECT {COLUMNS} FROM certificates
                        ORDER BY created_at DESC, id DESC
                        LIMIT $1 OFFSET $2
                        "#
                    ))
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await?
                };
                Ok(certs)
            }

            Database::Memory(tables) => {
                let mut certs: Vec<Certificate> = tables
                    .certificates
                    .iter()
                    .filter(|c| params.org_id.map_or(true, |org| c.organization_id == org))
                    .map(|c| c.clone())
                    .collect();
                certs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
                Ok(certs
                    .into_iter()
                    .skip(offset as usize)
                    .take(limit as usize)
                    .collect())
            }
        }
    }

    /// Record a confirmed anchor.
    pub async fn mark_anchored(
        &self,
        id: i64,
        tx_hash: &str,
    ) -> Result<Option<Certificate>, StoreError> {
        match &self.db {
            Database::Postgres(pool) => Ok(sqlx::query_as::<_, Certificate>(&format!(
                r#"
                UPDATE certificates
                SET anchor_status = 'anchored', tx_hash = $2, anchored_at = NOW(),
                    anchor_attempts = anchor_attempts + 1, last_anchor_error = NULL
                WHERE id = $1
                RETURNING {COLUMNS}
                "#
            ))
            .bind(id)
            .bind(tx_hash)
            .fetch_optional(pool)
            .await?),

            Database::Memory(tables) => Ok(tables.certificates.get_mut(&id).map(|mut c| {
                c.anchor_status = AnchorStatus::Anchored;
                c.tx_hash = Some(tx_hash.to_string());
                c.anchored_at = Some(Utc::now());
                c.anchor_attempts += 1;
                c.last_anchor_error = None;
                c.clone()
            })),
        }
    }

    /// Return an anchored certificate to `pending` while keeping its
    /// transaction hash, so the outbox finishes work still owed on chain.
    pub async fn reopen_anchor(
        &self,
        id: i64,
        error: &str,
    ) -> Result<Option<Certificate>, StoreError> {
        match &self.db {
            Database::Postgres(pool) => Ok(sqlx::query_as::<_, Certificate>(&format!(
                r#"
                UPDATE certificates
                SET anchor_status = 'pending', anchored_at = NULL, last_anchor_error = $2
                WHERE id = $1 AND anchor_status = 'anchored'
                RETURNING {COLUMNS}
                "#
            ))
            .bind(id)
            .bind(error)
            .fetch_optional(pool)
            .await?),

            Database::Memory(tables) => Ok(tables
                .certificates
                .get_mut(&id)
                .filter(|c| c.anchor_status == AnchorStatus::Anchored)
                .map(|mut c| {
                    c.anchor_status = AnchorStatus::Pending;
                    c.anchored_at = None;
                    c.last_anchor_error = Some(error.to_string());
                    c.clone()
                })),
        }
    }

    /// Count a failed anchoring attempt; the certificate stays `pending`.
    pub async fn record_anchor_failure(
        &self,
        id: i64,
        error: &str,
    ) -> Result<Option<Certificate>, StoreError> {
        self.update_anchor_failure(id, error, AnchorStatus::Pending)
            .await
    }

    /// Move the certificate to `failed`.
    pub async fn mark_failed(
        &self,
        id: i64,
        error: &str,
    ) -> Result<Option<Certificate>, StoreError> {
        self.update_anchor_failure(id, error, AnchorStatus::Failed)
            .await
    }

    async fn update_anchor_failure(
        &self,
        id: i64,
        error: &str,
        status: AnchorStatus,
    ) -> Result<Option<Certificate>, StoreError> {
        match &self.db {
            Database::Postgres(pool) => Ok(sqlx::query_as::<_, Certificate>(&format!(
                r#"
                UPDATE certificates
                SET anchor_status = $2, anchor_attempts = anchor_attempts + 1,
                    last_anchor_error = $3
                WHERE id = $1 AND anchor_status <> 'anchored'
                RETURNING {COLUMNS}
                "#
            ))
            .bind(id)
            .bind(status.as_str())
            .bind(error)
            .fetch_optional(pool)
            .await?),

            Database::Memory(tables) => Ok(tables
                .certificates
                .get_mut(&id)
                .filter(|c| c.anchor_status != AnchorStatus::Anchored)
                .map(|mut c| {
                    c.anchor_status = status;
                    c.anchor_attempts += 1;
                    c.last_anchor_error = Some(error.to_string());
                    c.clone()
                })),
        }
    }

    /// Set the local revocation flag. Returns the certificate and whether it
    /// changed, or `None` when it does not exist.
    pub async fn mark_revoked(&self, id: i64) -> Result<Option<(Certificate, bool)>, StoreError> {
        match &self.db {
            Database::Postgres(pool) => {
                let changed = sqlx::query_as::<_, Certificate>(&format!(
                    r#"
                    UPDATE certificates
                    SET revoked = TRUE
                    WHERE id = $1 AND revoked = FALSE
                    RETURNING {COLUMNS}
                    "#
                ))
                .bind(id)
                .fetch_optional(pool)
                .await?;

                match changed {
                    Some(cert) => Ok(Some((cert, true))),
                    None => Ok(self.find_by_id(id).await?.map(|cert| (cert, false))),
                }
            }

            Database::Memory(tables) => Ok(tables.certificates.get_mut(&id).map(|mut c| {
                let changed = !c.revoked;
                c.revoked = true;
                (c.clone(), changed)
            })),
        }
    }

    /// Administrative hard delete. Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        match &self.db {
            Database::Postgres(pool) => {
                let result = sqlx::query("DELETE FROM certificates WHERE id = $1")
                    .bind(id)
                    .execute(pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            }

            Database::Memory(tables) => match tables.certificates.remove(&id) {
                Some((_, cert)) => {
                    tables.certificate_hashes.remove(&cert.cert_hash);
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    /// Oldest pending certificates first, for the outbox worker.
    pub async fn list_pending(&self, limit: i64) -> Result<Vec<Certificate>, StoreError> {
        match &self.db {
            Database::Postgres(pool) => Ok(sqlx::query_as::<_, Certificate>(&format!(
                r#"
                SELECT {COLUMNS} FROM certificates
                WHERE anchor_status = 'pending'
                ORDER BY created_at ASC, id ASC
                LIMIT $1
                "#
            ))
            .bind(limit)
            .fetch_all(pool)
            .await?),

            Database::Memory(tables) => {
                let mut pending: Vec<Certificate> = tables
                    .certificates
                    .iter()
                    .filter(|c| c.anchor_status == AnchorStatus::Pending)
                    .map(|c| c.clone())
                    .collect();
                pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
                pending.truncate(limit.max(0) as usize);
                Ok(pending)
            }
        }
    }
}
