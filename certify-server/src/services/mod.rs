//! Certificate workflows shared by the HTTP handlers and background tasks.

pub mod issuance;
pub mod outbox;
pub mod verification;

pub use issuance::{IssueRequest, IssueResponse};
pub use verification::{OnChainRecord, VerificationReport, VerificationStatus};
