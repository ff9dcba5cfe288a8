//! JWT authentication module
//!
//! Access tokens are HS256 JWTs signed with the server secret. The
//! `AuthenticatedUser` extractor validates the Bearer token and resolves the
//! user from the database; handlers receive the session through the request
//! instead of any global state.

pub mod password;

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::User;
use crate::error::ApiError;
use crate::state::AppState;

pub use password::{hash_password, verify_password};

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Role name
    pub role: String,
    /// Organization the user administers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<i64>,
    /// Issued at (Unix seconds)
    pub iat: u64,
    /// Expiration time (validated by jsonwebtoken)
    pub exp: u64,
}

/// Signing and verification keys for access tokens
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl JwtKeys {
    pub fn new(secret: &[u8], ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs: ttl_minutes.max(1) as u64 * 60,
        }
    }

    /// Keys from a fresh random secret. Tokens do not survive a restart.
    pub fn random(ttl_minutes: i64) -> Self {
        let secret: [u8; 32] = rand::random();
        Self::new(&secret, ttl_minutes)
    }

    /// Token lifetime in seconds
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Issue an access token for `user`.
    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        let iat = now_epoch();
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role.clone(),
            org: user.organization_id,
            iat,
            exp: iat + self.ttl_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to sign token: {e}")))
    }

    /// Validate a token and return its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::auth_error("AUTH_TOKEN_EXPIRED", "Token has expired")
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    ApiError::auth_error("AUTH_INVALID_TOKEN", "Invalid token signature")
                }
                _ => ApiError::auth_error(
                    "AUTH_INVALID_TOKEN",
                    format!("Token validation failed: {}", e),
                ),
            })
    }
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Extract the Bearer token from the Authorization header
fn extract_bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::auth_error("AUTH_MISSING_TOKEN", "Missing Authorization header")
        })?;

    let auth_value = auth_header.to_str().map_err(|_| {
        ApiError::auth_error(
            "AUTH_INVALID_TOKEN",
            "Invalid Authorization header encoding",
        )
    })?;

    auth_value.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::auth_error(
            "AUTH_INVALID_TOKEN",
            "Authorization header must use Bearer scheme",
        )
    })
}

/// Authenticated user extractor.
///
/// 1. Reads `Authorization: Bearer <token>`
/// 2. Validates the token signature and expiry
/// 3. Loads the user named by the `sub` claim
///
/// Returns 401 with structured error codes on any failure.
pub struct AuthenticatedUser {
    pub user: User,
}

impl AuthenticatedUser {
    /// Enforce the tenant rule: a user bound to an organization may only act
    /// on that organization.
    pub fn require_org(&self, organization_id: i64) -> Result<(), ApiError> {
        if self.user.can_act_for(organization_id) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = self.user.id,
                organization_id,
                "Cross-organization access denied"
            );
            Err(ApiError::forbidden(
                "Not allowed to act on behalf of this organization",
            ))
        }
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)?;
        let claims = state.jwt.validate(token)?;

        let user_id: i64 = claims.sub.parse().map_err(|_| {
            ApiError::auth_error("AUTH_INVALID_TOKEN", "Token subject is not a user ID")
        })?;

        let user = state
            .db
            .users()
            .find_by_id(user_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to look up user by ID");
                ApiError::internal("A database error occurred")
            })?
            .ok_or_else(|| {
                ApiError::auth_error(
                    "AUTH_USER_NOT_FOUND",
                    "Valid token but user not found in database",
                )
            })?;

        Ok(AuthenticatedUser { user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(org: Option<i64>) -> User {
        User {
            id: 42,
            email: "admin@example.edu".into(),
            password_hash: String::new(),
            role: "admin".into(),
            organization_id: org,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_validate() {
        let keys = JwtKeys::new(b"test-secret", 60);
        let token = keys.issue(&user(Some(3))).unwrap();

        let claims = keys.validate(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.org, Some(3));
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired_token() {
        let keys = JwtKeys::new(b"test-secret", 60);
        let claims = Claims {
            sub: "42".into(),
            role: "admin".into(),
            org: None,
            iat: now_epoch() - 7200,
            exp: now_epoch() - 3600,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).unwrap();

        match keys.validate(&token).unwrap_err() {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_TOKEN_EXPIRED"),
            other => panic!("Expected AUTH_TOKEN_EXPIRED, got: {:?}", other),
        }
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let token = JwtKeys::new(b"other-secret", 60)
            .issue(&user(None))
            .unwrap();

        match JwtKeys::new(b"test-secret", 60).validate(&token).unwrap_err() {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_INVALID_TOKEN"),
            other => panic!("Expected AUTH_INVALID_TOKEN, got: {:?}", other),
        }
    }

    #[test]
    fn test_garbage_token() {
        let keys = JwtKeys::random(60);
        assert!(keys.validate("not-a-valid-jwt").is_err());
    }

    #[test]
    fn test_extract_bearer_token_missing_header() {
        let (parts, _) = axum::http::Request::builder()
            .body(())
            .unwrap()
            .into_parts();

        match extract_bearer_token(&parts).unwrap_err() {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_MISSING_TOKEN"),
            other => panic!("Expected AUTH_MISSING_TOKEN, got: {:?}", other),
        }
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let (parts, _) = axum::http::Request::builder()
            .header("Authorization", "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap()
            .into_parts();

        match extract_bearer_token(&parts).unwrap_err() {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_INVALID_TOKEN"),
            other => panic!("Expected AUTH_INVALID_TOKEN, got: {:?}", other),
        }
    }

    #[test]
    fn test_extract_bearer_token_success() {
        let (parts, _) = axum::http::Request::builder()
            .header("Authorization", "Bearer my-jwt-token")
            .body(())
            .unwrap()
            .into_parts();

        assert_eq!(extract_bearer_token(&parts).unwrap(), "my-jwt-token");
    }

    #[test]
    fn test_require_org() {
        let tenant = AuthenticatedUser {
            user: user(Some(3)),
        };
        assert!(tenant.require_org(3).is_ok());
        assert!(matches!(
            tenant.require_org(4).unwrap_err(),
            ApiError::Forbidden(_)
        ));

        let platform = AuthenticatedUser { user: user(None) };
        assert!(platform.require_org(4).is_ok());
    }
}
