//! Integrity validation of downloaded content.

mod report;
mod validator;

pub use report::{ValidationFailure, ValidationOutcome};
pub use validator::{IntegrityValidator, DEFAULT_MIN_PAYLOAD_FILES};
