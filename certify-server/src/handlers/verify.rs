//! Certificate verification handlers
//!
//! Public endpoints: anyone holding a fingerprint or the document itself
//! can check it.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};

use crate::error::ApiError;
use crate::extract::ApiPath;
use crate::multipart::MultipartFields;
use crate::services::verification::{self, VerificationReport};
use crate::state::AppState;

/// Verify a certificate by hash
///
/// Looks the fingerprint up in the local records and the on-chain registry.
/// A malformed hash is rejected before any lookup.
#[utoipa::path(
    get,
    path = "/certificates/verify/{cert_hash}",
    tag = "Verification",
    params(
        ("cert_hash" = String, Path, description = "SHA-256 fingerprint, 64 hex characters")
    ),
    responses(
        (status = 200, description = "Verification report", body = VerificationReport),
        (status = 400, description = "Malformed hash"),
        (status = 404, description = "Certificate not found in local records")
    )
)]
pub async fn verify_hash_handler(
    State(state): State<AppState>,
    ApiPath(cert_hash): ApiPath<String>,
) -> Result<Json<VerificationReport>, ApiError> {
    let report = verification::verify_hash(&state, &cert_hash).await?;
    Ok(Json(report))
}

/// Verify a certificate document
///
/// Accepts multipart/form-data with:
/// - **file** (required): the certificate document
///
/// The document is fingerprinted and verified like a hash.
#[utoipa::path(
    post,
    path = "/certificates/verify-file",
    tag = "Verification",
    request_body(
        content_type = "multipart/form-data",
        description = "Certificate document in the 'file' field"
    ),
    responses(
        (status = 200, description = "Verification report", body = VerificationReport),
        (status = 400, description = "Missing or empty file"),
        (status = 404, description = "Certificate not found in local records")
    )
)]
pub async fn verify_file_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VerificationReport>, ApiError> {
    let mut multipart = multipart?;
    let fields =
        MultipartFields::parse(&mut multipart, true, state.config.max_file_size()).await?;
    let file = fields.require_file()?;

    tracing::debug!(
        file_name = file.file_name.as_deref().unwrap_or("-"),
        content_type = file.content_type.as_deref().unwrap_or("-"),
        size = file.data.len(),
        "Verifying uploaded document"
    );

    let report = verification::verify_document(&state, &file.data).await?;
    Ok(Json(report))
}
