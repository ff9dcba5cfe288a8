//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid hash, field or timestamp).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Certificate unknown, revoked or not anchored.
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Certificate API or chain unreachable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Error prefixes used by commands; [`ExitCode::from_anyhow`] classifies on them.
pub const INVALID_ARGUMENT: &str = "Invalid argument";
pub const READ_FAILED: &str = "Failed to read file";
pub const WRITE_FAILED: &str = "Failed to write";
pub const VERIFICATION: &str = "Verification failed";
pub const UNAVAILABLE: &str = "Service unavailable";

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by the outermost context
        let code = if message.starts_with(READ_FAILED) {
            INPUT_ERROR
        } else if message.starts_with(INVALID_ARGUMENT) {
            USAGE_ERROR
        } else if message.starts_with(VERIFICATION) {
            VERIFICATION_FAILED
        } else if message.starts_with(UNAVAILABLE) {
            NETWORK_ERROR
        } else if message.starts_with(WRITE_FAILED) {
            IO_ERROR
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
