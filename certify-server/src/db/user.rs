//! User entity and repository
//!
//! Users are administrators. A user bound to an organization may only act
//! on that organization; a user without one is a platform administrator.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{conflict_on_unique, Database, StoreError};

const DUPLICATE_EMAIL: &str = "Email already registered";

/// User entity from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub organization_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether this user may act on behalf of `organization_id`.
    pub fn can_act_for(&self, organization_id: i64) -> bool {
        self.organization_id
            .map_or(true, |own| own == organization_id)
    }
}

/// DTO for creating a new user (email normalized, password already hashed)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub organization_id: Option<i64>,
}

/// User response DTO (excludes the password hash)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    /// User identifier
    #[schema(example = 1)]
    pub id: i64,
    /// Login email
    #[schema(example = "admin@example.edu")]
    pub email: String,
    /// Role name
    #[schema(example = "admin")]
    pub role: String,
    /// Organization the user administers; `null` for platform administrators
    #[schema(example = 1)]
    pub organization_id: Option<i64>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            organization_id: user.organization_id,
        }
    }
}

/// Repository for user operations
#[derive(Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new user. Emails are unique.
    pub async fn create(&self, input: NewUser) -> Result<User, StoreError> {
        match &self.db {
            Database::Postgres(pool) => sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (email, password_hash, role, organization_id)
                VALUES ($1, $2, $3, $4)
                RETURNING id, email, password_hash, role, organization_id, created_at
                "#,
            )
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(&input.role)
            .bind(input.organization_id)
            .fetch_one(pool)
            .await
            .map_err(|e| conflict_on_unique(e, DUPLICATE_EMAIL)),

            Database::Memory(tables) => match tables.user_emails.entry(input.email.clone()) {
                Entry::Occupied(_) => Err(StoreError::Conflict(DUPLICATE_EMAIL.to_string())),
                Entry::Vacant(slot) => {
                    let user = User {
                        id: tables.next_user_id(),
                        email: input.email,
                        password_hash: input.password_hash,
                        role: input.role,
                        organization_id: input.organization_id,
                        created_at: Utc::now(),
                    };
                    slot.insert(user.id);
                    tables.users.insert(user.id, user.clone());
                    Ok(user)
                }
            },
        }
    }

    /// Find user by internal ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        match &self.db {
            Database::Postgres(pool) => Ok(sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password_hash, role, organization_id, created_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(pool)
            .await?),

            Database::Memory(tables) => Ok(tables.users.get(&id).map(|u| u.clone())),
        }
    }

    /// Find user by (normalized) email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        match &self.db {
            Database::Postgres(pool) => Ok(sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password_hash, role, organization_id, created_at
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email)
            .fetch_optional(pool)
            .await?),

            Database::Memory(tables) => Ok(tables
                .user_emails
                .get(email)
                .and_then(|id| tables.users.get(&*id).map(|u| u.clone()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(email: &str, org: Option<i64>) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "$argon2id$placeholder".into(),
            role: "admin".into(),
            organization_id: org,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = Database::in_memory().users();
        let user = repo.create(admin("a@example.edu", Some(3))).await.unwrap();

        let by_email = repo.find_by_email("a@example.edu").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        let by_id = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.organization_id, Some(3));
        assert!(repo.find_by_email("b@example.edu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let repo = Database::in_memory().users();
        repo.create(admin("a@example.edu", None)).await.unwrap();
        let err = repo.create(admin("a@example.edu", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_tenant_scope() {
        let tenant = User {
            id: 1,
            email: "a@example.edu".into(),
            password_hash: String::new(),
            role: "admin".into(),
            organization_id: Some(3),
            created_at: Utc::now(),
        };
        assert!(tenant.can_act_for(3));
        assert!(!tenant.can_act_for(4));

        let platform = User {
            organization_id: None,
            ..tenant
        };
        assert!(platform.can_act_for(4));
    }

    #[test]
    fn test_response_hides_password_hash() {
        let user = User {
            id: 1,
            email: "a@example.edu".into(),
            password_hash: "secret-hash".into(),
            role: "admin".into(),
            organization_id: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&UserResponse::from(user.clone())).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!serde_json::to_string(&user).unwrap().contains("secret-hash"));
    }
}
