//! Error types for E2E testing

use stormcheck_common::{ContractError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    /// Bad fixture graph or harness settings. Surfaces before any test body runs.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Use-after-dispose or re-entrant resolution. Fatal to the offending test only.
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// A worker-scoped fixture failed earlier in this run and is not retried.
    #[error("Fixture '{name}' aborted: {reason}")]
    Aborted { name: String, reason: String },

    #[error("Fixture '{name}' failed: {source}")]
    FixtureFailed {
        name: String,
        #[source]
        source: Box<E2eError>,
    },

    #[error("Fixture '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("Session setup failed: {0}")]
    SessionSetup(String),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("Playwright not found. Install with: npm i -D playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<ValidationError> for E2eError {
    fn from(e: ValidationError) -> Self {
        E2eError::Contract(ContractError::Validation(e))
    }
}

impl E2eError {
    /// Whether this failure stems from an aborted shared fixture rather than the test itself
    pub fn is_aborted(&self) -> bool {
        match self {
            E2eError::Aborted { .. } => true,
            E2eError::FixtureFailed { source, .. } => source.is_aborted(),
            _ => false,
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
