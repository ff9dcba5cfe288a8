//! Registration and login handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{hash_password, password::verify_dummy, verify_password};
use crate::db::{NewUser, UserResponse};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;
use crate::validation::{normalize_email, validate_password};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const DEFAULT_ROLE: &str = "admin";

/// Request body for registration
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Login email
    #[schema(example = "admin@example.edu")]
    pub email: String,
    /// Password, 8 to 128 characters
    #[schema(example = "correct horse battery")]
    pub password: String,
    /// Role name (default: admin)
    #[serde(default)]
    #[schema(example = "admin")]
    pub role: Option<String>,
    /// Organization the user administers; omit for a platform administrator
    #[serde(default)]
    #[schema(example = 1)]
    pub organization_id: Option<i64>,
}

/// Request body for login
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "admin@example.edu")]
    pub email: String,
    #[schema(example = "correct horse battery")]
    pub password: String,
}

/// Access token response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// HS256 JWT for the `Authorization: Bearer` header
    pub access_token: String,
    /// Always "bearer"
    #[schema(example = "bearer")]
    pub token_type: String,
    /// Token lifetime in seconds
    #[schema(example = 3600)]
    pub expires_in: u64,
}

/// Register a user
///
/// Disabled unless `ALLOW_REGISTRATION=true`.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid email or password, or email already registered"),
        (status = 403, description = "Registration disabled"),
        (status = 404, description = "Organization not found")
    )
)]
pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    if !state.config.allow_registration {
        return Err(ApiError::forbidden("Registration is disabled"));
    }

    let email = normalize_email(&request.email)?;
    validate_password(&request.password)?;

    if let Some(org_id) = request.organization_id {
        state
            .db
            .organizations()
            .get(org_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Organization not found"))?;
    }

    let role = request
        .role
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_ROLE.to_string());

    let password_hash = hash_password(&request.password)?;
    let user = state
        .db
        .users()
        .create(NewUser {
            email,
            password_hash,
            role,
            organization_id: request.organization_id,
        })
        .await?;

    tracing::info!(user_id = user.id, organization_id = ?user.organization_id, "User registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Log in
///
/// Unknown email and wrong password produce the same 401.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = request.email.trim().to_lowercase();
    let user = state.db.users().find_by_email(&email).await?;

    let user = match user {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        Some(user) => {
            tracing::info!(user_id = user.id, "Login failed: wrong password");
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }
        None => {
            verify_dummy(&request.password);
            tracing::info!("Login failed: unknown email");
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }
    };

    let access_token = state.jwt.issue(&user)?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.jwt.ttl_secs(),
    }))
}
