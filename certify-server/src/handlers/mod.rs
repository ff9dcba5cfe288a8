//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod auth;
pub mod certificates;
pub mod health;
pub mod organizations;
pub mod verify;

pub use crate::state::AppState;
pub use auth::{login_handler, register_handler, LoginRequest, RegisterRequest, TokenResponse};
pub use certificates::{
    anchor_handler, delete_handler, document_handler, get_handler, issue_handler, list_handler,
    revoke_handler,
};
pub use health::{health, ready, root, HealthResponse, ReadyResponse};
pub use organizations::{
    create_organization_handler, get_organization_handler, update_organization_handler,
    CreateOrganizationRequest, UpdateOrganizationRequest,
};
pub use verify::{verify_file_handler, verify_hash_handler};
