//! Certificate management handlers
//!
//! Issuance, listing, anchor retry, revocation and deletion. All except the
//! document download require an access token; tenant users only see and act
//! on their own organization.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::auth::AuthenticatedUser;
use crate::db::{CertificateListParams, CertificateRecord};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::services::issuance::{self, IssueRequest, IssueResponse};
use crate::state::AppState;

/// Issue a certificate
///
/// Builds the canonical document, stores it, and anchors its fingerprint on
/// chain. When the local write succeeded but anchoring did not complete the
/// response is 503 `ANCHOR_PENDING` with `certificate_id` and `cert_hash`;
/// retry with `POST /certificates/{id}/anchor`.
#[utoipa::path(
    post,
    path = "/certificates/issue",
    tag = "Certificates",
    request_body = IssueRequest,
    responses(
        (status = 200, description = "Certificate issued and anchored", body = IssueResponse),
        (status = 400, description = "Invalid field"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Organization belongs to another tenant"),
        (status = 404, description = "Organization not found"),
        (status = 502, description = "Chain rejected the transaction"),
        (status = 503, description = "Stored locally, anchor pending")
    ),
    security(("bearer_token" = []))
)]
pub async fn issue_handler(
    State(state): State<AppState>,
    session: AuthenticatedUser,
    ApiJson(request): ApiJson<IssueRequest>,
) -> Result<Json<IssueResponse>, ApiError> {
    let issued = issuance::issue(&state, &session, request).await?;
    Ok(Json(issued))
}

/// List certificates
///
/// Newest first. Tenant users are restricted to their own organization.
#[utoipa::path(
    get,
    path = "/certificates",
    tag = "Certificates",
    params(CertificateListParams),
    responses(
        (status = 200, description = "Certificates", body = [CertificateRecord]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Organization belongs to another tenant")
    ),
    security(("bearer_token" = []))
)]
pub async fn list_handler(
    State(state): State<AppState>,
    session: AuthenticatedUser,
    ApiQuery(mut params): ApiQuery<CertificateListParams>,
) -> Result<Json<Vec<CertificateRecord>>, ApiError> {
    if let Some(own) = session.user.organization_id {
        match params.org_id {
            Some(requested) => session.require_org(requested)?,
            None => params.org_id = Some(own),
        }
    }

    let certs = state.db.certificates().list(&params).await?;
    Ok(Json(certs.into_iter().map(CertificateRecord::from).collect()))
}

/// Get a certificate
#[utoipa::path(
    get,
    path = "/certificates/{id}",
    tag = "Certificates",
    params(("id" = i64, Path, description = "Certificate ID")),
    responses(
        (status = 200, description = "Certificate", body = CertificateRecord),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Certificate not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn get_handler(
    State(state): State<AppState>,
    session: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<CertificateRecord>, ApiError> {
    let cert = issuance::find_authorized(&state, &session, id).await?;
    Ok(Json(cert.into()))
}

/// Download the canonical certificate document
///
/// The bytes whose SHA-256 is the certificate's `cert_hash`.
#[utoipa::path(
    get,
    path = "/certificates/{id}/document",
    tag = "Certificates",
    params(("id" = i64, Path, description = "Certificate ID")),
    responses(
        (status = 200, description = "Canonical document", content_type = "application/json"),
        (status = 404, description = "Certificate not found")
    )
)]
pub async fn document_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let cert = state
        .db
        .certificates()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Certificate not found"))?;

    let disposition = format!("attachment; filename=\"certificate-{}.json\"", cert.id);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        cert.document,
    ))
}

/// Retry the anchoring step
///
/// Idempotent: an anchored certificate returns its existing transaction.
#[utoipa::path(
    post,
    path = "/certificates/{id}/anchor",
    tag = "Certificates",
    params(("id" = i64, Path, description = "Certificate ID")),
    responses(
        (status = 200, description = "Certificate anchored", body = IssueResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Certificate not found"),
        (status = 502, description = "Chain rejected the transaction"),
        (status = 503, description = "Anchor still pending")
    ),
    security(("bearer_token" = []))
)]
pub async fn anchor_handler(
    State(state): State<AppState>,
    session: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<IssueResponse>, ApiError> {
    let anchored = issuance::retry_anchor(&state, &session, id).await?;
    Ok(Json(anchored))
}

/// Revoke a certificate
///
/// One-way and idempotent. Revoked certificates still verify, with status
/// `revoked`.
#[utoipa::path(
    post,
    path = "/certificates/{id}/revoke",
    tag = "Certificates",
    params(("id" = i64, Path, description = "Certificate ID")),
    responses(
        (status = 200, description = "Certificate revoked", body = CertificateRecord),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Certificate not found"),
        (status = 503, description = "Revoked locally; chain revocation pending")
    ),
    security(("bearer_token" = []))
)]
pub async fn revoke_handler(
    State(state): State<AppState>,
    session: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<CertificateRecord>, ApiError> {
    let record = issuance::revoke(&state, &session, id).await?;
    Ok(Json(record))
}

/// Delete a certificate record
///
/// Administrative removal of the local record. The on-chain attestation is
/// not affected; use revocation to invalidate a certificate.
#[utoipa::path(
    delete,
    path = "/certificates/{id}",
    tag = "Certificates",
    params(("id" = i64, Path, description = "Certificate ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Certificate not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn delete_handler(
    State(state): State<AppState>,
    session: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    issuance::delete(&state, &session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
