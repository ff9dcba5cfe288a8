//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.
//! Every error body carries a human-readable `detail` and a machine-readable `code`.

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use certify_core::{CertifyError, ErrorKind};
use thiserror::Error;

use crate::db::StoreError;

/// Detail returned for every fatal error; internal text is only logged.
const INTERNAL_DETAIL: &str = "Internal server error";

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized - missing or invalid authentication
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden - authenticated but not allowed to act on the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Authentication error with specific error code
    #[error("{message}")]
    AuthError { message: String, code: String },

    /// The certificate was stored locally but its chain anchor is still pending.
    /// Retrying `POST /certificates/{id}/anchor` completes issuance.
    #[error("Anchor pending for certificate {certificate_id}: {reason}")]
    AnchorPending {
        certificate_id: i64,
        cert_hash: String,
        reason: String,
    },

    /// The chain permanently rejected the anchoring transaction.
    #[error("Anchor failed for certificate {certificate_id}: {reason}")]
    AnchorFailed {
        certificate_id: i64,
        cert_hash: String,
        reason: String,
    },

    /// Domain error from certify-core
    #[error("Certify error: {0}")]
    Certify(#[from] CertifyError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an authentication error with a specific error code
    pub fn auth_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
            code: code.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::AuthError { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AnchorPending { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::AnchorFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::Certify(e) => match e.kind() {
                ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorKind::Retryable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &str {
        match self {
            Self::BadRequest(_) => "INVALID_ARGUMENT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::AuthError { code, .. } => code,
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::AnchorPending { .. } => "ANCHOR_PENDING",
            Self::AnchorFailed { .. } => "ANCHOR_FAILED",
            Self::Certify(e) => match e {
                CertifyError::InvalidHash(_) => "INVALID_HASH",
                CertifyError::EmptyDocument => "EMPTY_DOCUMENT",
                CertifyError::InvalidField { .. } => "INVALID_ARGUMENT",
                CertifyError::NotFound(_) => "NOT_FOUND",
                CertifyError::ChainTimeout(_) => "CHAIN_TIMEOUT",
                CertifyError::ChainUnavailable(_) => "CHAIN_UNAVAILABLE",
                _ if e.kind() == ErrorKind::Retryable => "CHAIN_UNAVAILABLE",
                _ => "INTERNAL_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    pub fn client_message(&self) -> String {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m) => m.clone(),
            Self::AuthError { message, .. } => message.clone(),
            Self::Internal(_) => INTERNAL_DETAIL.to_string(),
            Self::AnchorPending { .. } => {
                "Certificate stored but not yet anchored on chain; retry the anchor step"
                    .to_string()
            }
            Self::AnchorFailed { .. } => "Blockchain rejected the certificate".to_string(),
            Self::Certify(e) => match e {
                CertifyError::NotFound(m) => m.clone(),
                CertifyError::InvalidHash(_)
                | CertifyError::EmptyDocument
                | CertifyError::InvalidField { .. } => e.to_string(),
                _ => match e.kind() {
                    ErrorKind::Retryable => "Blockchain service temporarily unavailable".into(),
                    _ => INTERNAL_DETAIL.to_string(),
                },
            },
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::AuthError { .. } => "auth_error",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
            Self::AnchorPending { .. } | Self::AnchorFailed { .. } => "anchor",
            Self::Certify(_) => "certify",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => Self::BadRequest(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Extractor rejections become `INVALID_ARGUMENT` with axum's explanation.
macro_rules! bad_request_from_rejection {
    ($($rejection:ty),+ $(,)?) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    Self::BadRequest(rejection.body_text())
                }
            }
        )+
    };
}

bad_request_from_rejection!(JsonRejection, PathRejection, QueryRejection, MultipartRejection);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code().to_string();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() {
            if status == StatusCode::SERVICE_UNAVAILABLE {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = %code,
                    error = %internal_message,
                    "Service unavailable"
                );
            } else {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = %code,
                    error = %internal_message,
                    "Server error"
                );
            }
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!(
                status = %status,
                category = category,
                code = %code,
                error = %internal_message,
                "Authentication error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = %code,
                error = %internal_message,
                "Client error"
            );
        }

        let body = match &self {
            Self::AnchorPending {
                certificate_id,
                cert_hash,
                ..
            }
            | Self::AnchorFailed {
                certificate_id,
                cert_hash,
                ..
            } => serde_json::json!({
                "detail": client_message,
                "code": code,
                "certificate_id": certificate_id,
                "cert_hash": cert_hash,
            }),
            _ => serde_json::json!({
                "detail": client_message,
                "code": code,
            }),
        };

        (status, Json(body)).into_response()
    }
}
