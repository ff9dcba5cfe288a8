//! Certify Server Library - REST API for certificate issuance and verification
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod multipart;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;

pub use auth::{AuthenticatedUser, Claims, JwtKeys};
pub use config::{ChainConfig, Config};
pub use db::{
    AnchorStatus, Certificate, CertificateListParams, CertificateRecord, Database, NewOrganization,
    Organization, StoreError, User, UserResponse,
};
pub use error::ApiError;
pub use openapi::ApiDoc;
pub use routes::{create_router, create_router_with_state};
pub use services::{
    IssueRequest, IssueResponse, OnChainRecord, VerificationReport, VerificationStatus,
};
pub use state::AppState;
