use std::time::Duration;

use thiserror::Error;

/// Coarse error classes surfaced to API clients.
///
/// Every [`CertifyError`] maps to exactly one kind; the server turns kinds into
/// HTTP statuses and never exposes `Fatal` details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed hash, empty document, empty required field
    InvalidArgument,
    /// No record, organization or attestation
    NotFound,
    /// Bad credentials or token
    Unauthorized,
    /// Transient chain or network failure; the caller may retry
    Retryable,
    /// Unexpected internal state
    Fatal,
}

#[derive(Error, Debug)]
pub enum CertifyError {
    #[error("Invalid certificate hash: {0}")]
    InvalidHash(String),

    #[error("Document is empty")]
    EmptyDocument,

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Chain confirmation timed out after {0:?}")]
    ChainTimeout(Duration),

    #[error("Chain unavailable: {0}")]
    ChainUnavailable(String),

    #[error("Chain rejected transaction: {0}")]
    ChainRejected(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl CertifyError {
    /// Create an invalid field error
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHash(_) | Self::EmptyDocument | Self::InvalidField { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ChainTimeout(_) | Self::ChainUnavailable(_) => ErrorKind::Retryable,
            Self::ChainRejected(_) | Self::SerializationError(_) | Self::Io(_) => ErrorKind::Fatal,
            #[cfg(feature = "network")]
            Self::HttpError(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    ErrorKind::Retryable
                } else {
                    ErrorKind::Fatal
                }
            }
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }
}

pub type Result<T> = std::result::Result<T, CertifyError>;
