//! CLI command implementations.

pub mod canonical;
pub mod fingerprint;
pub mod verify;
