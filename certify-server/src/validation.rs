//! Input validation module
//!
//! Validation utilities for uploads, organization domains, wallet addresses
//! and login credentials.

use crate::error::ApiError;

/// Allowed MIME types for certificate document uploads
const ALLOWED_MIME_PREFIXES: &[&str] = &[
    "application/pdf",
    "application/json",
    "application/octet-stream",
];

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length
pub const MAX_PASSWORD_LENGTH: usize = 128;

const MAX_DOMAIN_LENGTH: usize = 253;
const MAX_LABEL_LENGTH: usize = 63;
const MAX_EMAIL_LENGTH: usize = 254;
const MAX_ORGANIZATION_NAME_CHARS: usize = 200;

/// Validates the Content-Type of an uploaded document
///
/// Accepts PDF, JSON (canonical certificate documents) and raw binary.
/// A missing Content-Type is treated as binary.
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    match content_type {
        Some(ct) => {
            let ct_lower = ct.to_lowercase();
            if ALLOWED_MIME_PREFIXES
                .iter()
                .any(|prefix| ct_lower.starts_with(prefix))
            {
                Ok(())
            } else {
                Err(ApiError::bad_request(format!(
                    "Unsupported Content-Type: '{}'. Allowed types: application/pdf, application/json, application/octet-stream",
                    ct
                )))
            }
        }
        None => Ok(()),
    }
}

/// Validates the size of an uploaded file
///
/// Returns an error if the file exceeds the maximum size.
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size > max_size {
        let max_mb = max_size / (1024 * 1024);
        let actual_mb = size / (1024 * 1024);
        Err(ApiError::bad_request(format!(
            "File too large: {} MB exceeds maximum of {} MB",
            actual_mb, max_mb
        )))
    } else {
        Ok(())
    }
}

/// Normalize and validate an organization domain.
///
/// Returns `Ok(None)` for an empty string (clears the domain). Domains are
/// lowercased ASCII hostnames with at least two labels and an alphabetic TLD.
pub fn normalize_domain(raw: &str) -> Result<Option<String>, ApiError> {
    let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return Ok(None);
    }

    let invalid = |reason: &str| ApiError::bad_request(format!("Invalid domain '{raw}': {reason}"));

    if domain.len() > MAX_DOMAIN_LENGTH {
        return Err(invalid("longer than 253 characters"));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid("must contain at least two labels"));
    }

    for label in &labels {
        if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
            return Err(invalid("labels must be 1-63 characters"));
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(invalid("only letters, digits and hyphens are allowed"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("labels must not start or end with a hyphen"));
        }
    }

    let tld = labels[labels.len() - 1];
    if !tld.bytes().all(|b| b.is_ascii_lowercase()) {
        return Err(invalid("top-level domain must be alphabetic"));
    }

    Ok(Some(domain))
}

/// Validate an EVM wallet address (`0x` + 40 hex), returned lowercased.
pub fn normalize_wallet_address(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| ApiError::bad_request("Wallet address must start with 0x"))?;

    if hex_part.len() != 40 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ApiError::bad_request(
            "Wallet address must be 0x followed by 40 hex characters",
        ));
    }
    Ok(format!("0x{}", hex_part.to_ascii_lowercase()))
}

/// Validate an organization name, returned trimmed.
pub fn normalize_organization_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Organization name must not be empty"));
    }
    if name.chars().count() > MAX_ORGANIZATION_NAME_CHARS {
        return Err(ApiError::bad_request(format!(
            "Organization name must be at most {MAX_ORGANIZATION_NAME_CHARS} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(ApiError::bad_request(
            "Organization name must not contain control characters",
        ));
    }
    Ok(name.to_string())
}

/// Normalize an email for storage and lookup (trimmed, lowercased).
pub fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = email.len() <= MAX_EMAIL_LENGTH
        && !email.chars().any(|c| c.is_whitespace() || c.is_control())
        && matches!(
            email.split_once('@'),
            Some((local, host)) if !local.is_empty() && host.contains('.') && !host.starts_with('.') && !host.ends_with('.') && !host.contains('@')
        );

    if valid {
        Ok(email)
    } else {
        Err(ApiError::bad_request("Invalid email address"))
    }
}

/// Validate a new password against the length policy.
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if password.trim().is_empty() {
        return Err(ApiError::bad_request(
            "Password cannot be empty or contain only whitespace",
        ));
    }
    if len < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
