//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 specification served at `/api-docs/openapi.json`
//! and rendered by Swagger UI at `/docs`.

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::db::{AnchorStatus, CertificateRecord, Organization, UserResponse};
use crate::handlers::{
    CreateOrganizationRequest, HealthResponse, LoginRequest, ReadyResponse, RegisterRequest,
    TokenResponse, UpdateOrganizationRequest,
};
use crate::services::{
    IssueRequest, IssueResponse, OnChainRecord, VerificationReport, VerificationStatus,
};

/// Certify API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Certify API",
        version = "0.1.0",
        description = r#"
## Blockchain-anchored certificate issuance and verification

Organizations issue certificates whose canonical document is fingerprinted
with SHA-256. The fingerprint (`cert_hash`) is anchored in an on-chain
registry; anyone can later check a hash or the document itself.

### How It Works

1. An administrator **issues** a certificate via `POST /certificates/issue`
2. The canonical document is stored and its fingerprint anchored on chain
3. Anyone **verifies** via `GET /certificates/verify/{cert_hash}` or by
   uploading the document to `POST /certificates/verify-file`
4. Revocation is one-way and visible both locally and on chain

Errors carry `{"detail": ..., "code": ...}`.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    tags(
        (name = "Verification", description = "Verify certificates by hash or document"),
        (name = "Certificates", description = "Issue, anchor, revoke and manage certificates"),
        (name = "Organizations", description = "Issuing organizations"),
        (name = "Auth", description = "Registration and login"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::verify::verify_hash_handler,
        crate::handlers::verify::verify_file_handler,
        crate::handlers::certificates::issue_handler,
        crate::handlers::certificates::list_handler,
        crate::handlers::certificates::get_handler,
        crate::handlers::certificates::document_handler,
        crate::handlers::certificates::anchor_handler,
        crate::handlers::certificates::revoke_handler,
        crate::handlers::certificates::delete_handler,
        crate::handlers::organizations::create_organization_handler,
        crate::handlers::organizations::get_organization_handler,
        crate::handlers::organizations::update_organization_handler,
        crate::handlers::auth::register_handler,
        crate::handlers::auth::login_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            VerificationReport,
            VerificationStatus,
            OnChainRecord,
            CertificateRecord,
            AnchorStatus,
            IssueRequest,
            IssueResponse,
            Organization,
            CreateOrganizationRequest,
            UpdateOrganizationRequest,
            RegisterRequest,
            LoginRequest,
            TokenResponse,
            UserResponse,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Registers the `bearer_token` security scheme used by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
