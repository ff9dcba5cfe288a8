//! Organization handlers

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::AuthenticatedUser;
use crate::db::{NewOrganization, Organization};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;
use crate::validation::{normalize_domain, normalize_organization_name, normalize_wallet_address};

/// Request body for creating an organization
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrganizationRequest {
    /// Unique display name
    #[schema(example = "Certify Academy")]
    pub name: String,
    /// Custom verification domain
    #[serde(default)]
    #[schema(example = "certs.example.edu")]
    pub domain: Option<String>,
    /// Issuer wallet address
    #[serde(default)]
    #[schema(example = "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1")]
    pub wallet_address: Option<String>,
}

/// Request body for updating an organization
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrganizationRequest {
    /// New domain; an empty string clears it
    #[schema(example = "certs.example.edu")]
    pub domain: String,
}

/// Create an organization
///
/// Only platform administrators (users not bound to an organization) may
/// create organizations.
#[utoipa::path(
    post,
    path = "/organizations",
    tag = "Organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = Organization),
        (status = 400, description = "Invalid field or organization already exists"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Tenant users cannot create organizations")
    ),
    security(("bearer_token" = []))
)]
pub async fn create_organization_handler(
    State(state): State<AppState>,
    session: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<Organization>), ApiError> {
    if session.user.organization_id.is_some() {
        return Err(ApiError::forbidden(
            "Only platform administrators can create organizations",
        ));
    }

    let name = normalize_organization_name(&request.name)?;
    let domain = match request.domain.as_deref() {
        Some(raw) => normalize_domain(raw)?,
        None => None,
    };
    let wallet_address = request
        .wallet_address
        .as_deref()
        .filter(|w| !w.trim().is_empty())
        .map(normalize_wallet_address)
        .transpose()?;

    let org = state
        .db
        .organizations()
        .create(NewOrganization {
            name,
            domain,
            wallet_address,
        })
        .await?;

    tracing::info!(organization_id = org.id, name = %org.name, "Organization created");

    Ok((StatusCode::CREATED, Json(org)))
}

/// Get an organization
#[utoipa::path(
    get,
    path = "/organizations/{id}",
    tag = "Organizations",
    params(("id" = i64, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization", body = Organization),
        (status = 404, description = "Organization not found")
    )
)]
pub async fn get_organization_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Organization>, ApiError> {
    let org = state
        .db
        .organizations()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization not found"))?;
    Ok(Json(org))
}

/// Update an organization's domain
#[utoipa::path(
    put,
    path = "/organizations/{id}",
    tag = "Organizations",
    params(("id" = i64, Path, description = "Organization ID")),
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Organization updated", body = Organization),
        (status = 400, description = "Malformed domain"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Organization belongs to another tenant"),
        (status = 404, description = "Organization not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn update_organization_handler(
    State(state): State<AppState>,
    session: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateOrganizationRequest>,
) -> Result<Json<Organization>, ApiError> {
    session.require_org(id)?;
    let domain = normalize_domain(&request.domain)?;

    let org = state
        .db
        .organizations()
        .update_domain(id, domain)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization not found"))?;

    tracing::info!(
        organization_id = org.id,
        domain = org.domain.as_deref().unwrap_or("-"),
        "Organization domain updated"
    );

    Ok(Json(org))
}
