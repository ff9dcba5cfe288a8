//! Organization entity and repository
//!
//! Organizations are the tenants that issue certificates. Each carries an
//! optional custom verification domain and issuer wallet.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{conflict_on_unique, Database, StoreError};

const DUPLICATE_NAME: &str = "Organization already exists";

/// Organization entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Organization {
    /// Organization identifier
    #[schema(example = 1)]
    pub id: i64,
    /// Unique display name
    #[schema(example = "Certify Academy")]
    pub name: String,
    /// Custom verification domain
    #[schema(example = "certs.example.edu")]
    pub domain: Option<String>,
    /// Issuer wallet address
    #[schema(example = "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1")]
    pub wallet_address: Option<String>,
    /// Creation timestamp
    #[schema(value_type = String, example = "2026-01-08T10:00:00Z")]
    pub created_at: DateTime<Utc>,
}

/// DTO for creating a new organization (already validated)
#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub domain: Option<String>,
    pub wallet_address: Option<String>,
}

/// Repository for organization operations
#[derive(Clone)]
pub struct OrganizationRepository {
    db: Database,
}

impl OrganizationRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new organization. Names are unique.
    pub async fn create(&self, input: NewOrganization) -> Result<Organization, StoreError> {
        match &self.db {
            Database::Postgres(pool) => sqlx::query_as::<_, Organization>(
                r#"
                INSERT INTO organizations (name, domain, wallet_address)
                VALUES ($1, $2, $3)
                RETURNING id, name, domain, wallet_address, created_at
                "#,
            )
            .bind(&input.name)
            .bind(&input.domain)
            .bind(&input.wallet_address)
            .fetch_one(pool)
            .await
            .map_err(|e| conflict_on_unique(e, DUPLICATE_NAME)),

            Database::Memory(tables) => match tables.organization_names.entry(input.name.clone())
            {
                Entry::Occupied(_) => Err(StoreError::Conflict(DUPLICATE_NAME.to_string())),
                Entry::Vacant(slot) => {
                    let org = Organization {
                        id: tables.next_organization_id(),
                        name: input.name,
                        domain: input.domain,
                        wallet_address: input.wallet_address,
                        created_at: Utc::now(),
                    };
                    slot.insert(org.id);
                    tables.organizations.insert(org.id, org.clone());
                    Ok(org)
                }
            },
        }
    }

    /// Find organization by ID
    pub async fn get(&self, id: i64) -> Result<Option<Organization>, StoreError> {
        match &self.db {
            Database::Postgres(pool) => Ok(sqlx::query_as::<_, Organization>(
                r#"
                SELECT id, name, domain, wallet_address, created_at
                FROM organizations
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(pool)
            .await?),

            Database::Memory(tables) => Ok(tables.organizations.get(&id).map(|o| o.clone())),
        }
    }

    /// Replace the organization's domain (`None` clears it).
    ///
    /// Returns `None` when the organization does not exist.
    pub async fn update_domain(
        &self,
        id: i64,
        domain: Option<String>,
    ) -> Result<Option<Organization>, StoreError> {
        match &self.db {
            Database::Postgres(pool) => Ok(sqlx::query_as::<_, Organization>(
                r#"
                UPDATE organizations
                SET domain = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING id, name, domain, wallet_address, created_at
                "#,
            )
            .bind(id)
            .bind(&domain)
            .fetch_optional(pool)
            .await?),

            Database::Memory(tables) => Ok(tables.organizations.get_mut(&id).map(|mut org| {
                org.domain = domain;
                org.clone()
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn academy() -> NewOrganization {
        NewOrganization {
            name: "Certify Academy".into(),
            domain: None,
            wallet_address: Some("0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1".into()),
        }
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let repo = Database::in_memory().organizations();
        let org = repo.create(academy()).await.unwrap();
        assert_eq!(org.id, 1);

        let fetched = repo.get(org.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Certify Academy");

        let updated = repo
            .update_domain(org.id, Some("certs.example.edu".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.domain.as_deref(), Some("certs.example.edu"));

        let cleared = repo.update_domain(org.id, None).await.unwrap().unwrap();
        assert!(cleared.domain.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let repo = Database::in_memory().organizations();
        repo.create(academy()).await.unwrap();
        let err = repo.create(academy()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_missing_organization() {
        let repo = Database::in_memory().organizations();
        assert!(repo.get(42).await.unwrap().is_none());
        assert!(repo.update_domain(42, None).await.unwrap().is_none());
    }
}
