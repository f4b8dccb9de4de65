//! Error types for contract validation

use thiserror::Error;

use crate::weather::ErrorCase;

/// Result type alias using the contract error
pub type Result<T> = std::result::Result<T, ContractError>;

/// A payload did not match its declared shape.
///
/// `path` is a JSONPath-like pointer to the offending field, e.g.
/// `$.weather[0].id`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Validation failed at {path}: {reason}")]
pub struct ValidationError {
    pub path: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Contract-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unknown error case: {0}")]
    UnknownCase(String),

    #[error("Upstream contract violation: no catalog entry matches {status_code} {message:?}")]
    UpstreamContractViolation { status_code: u16, message: String },

    #[error("Error case '{case}' mismatch: expected {expected:?}, got {actual:?}")]
    Mismatch {
        case: String,
        expected: ErrorCase,
        actual: ErrorCase,
    },
}
