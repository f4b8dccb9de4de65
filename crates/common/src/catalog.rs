//! Expected error responses of the current weather endpoint
//!
//! Entries are keyed by the semantic case name used in assertions. Lookups
//! never fall back to a default: an unknown name is an error, and an observed
//! error that matches no entry is an upstream contract violation.

use tracing::warn;

use crate::error::{ContractError, Result};
use crate::weather::ErrorCase;

pub const NOTHING_TO_GEOCODE: &str = "nothingToGeocode";
pub const INVALID_API_KEY: &str = "invalidApiKey";
pub const CITY_NOT_FOUND: &str = "cityNotFound";
pub const WRONG_LATITUDE: &str = "wrongLatitude";
pub const WRONG_LONGITUDE: &str = "wrongLongitude";

/// One row of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub status_code: u16,
    pub message: &'static str,
}

impl CatalogEntry {
    pub fn to_case(&self) -> ErrorCase {
        ErrorCase::new(self.status_code, self.message)
    }
}

const CURRENT_WEATHER: &[CatalogEntry] = &[
    CatalogEntry {
        name: NOTHING_TO_GEOCODE,
        status_code: 400,
        message: "Nothing to geocode",
    },
    CatalogEntry {
        name: INVALID_API_KEY,
        status_code: 401,
        message: "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info.",
    },
    CatalogEntry {
        name: CITY_NOT_FOUND,
        status_code: 404,
        message: "city not found",
    },
    CatalogEntry {
        name: WRONG_LATITUDE,
        status_code: 400,
        message: "wrong latitude",
    },
    CatalogEntry {
        name: WRONG_LONGITUDE,
        status_code: 400,
        message: "wrong longitude",
    },
];

/// Static oracle of normalized error responses
#[derive(Debug, Clone, Copy)]
pub struct ErrorCatalog {
    entries: &'static [CatalogEntry],
}

impl ErrorCatalog {
    /// Catalog for `/data/2.5/weather`
    pub fn current_weather() -> Self {
        Self {
            entries: CURRENT_WEATHER,
        }
    }

    pub fn entries(&self) -> &'static [CatalogEntry] {
        self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }

    /// Expected error for a case name
    pub fn get(&self, name: &str) -> Result<ErrorCase> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(CatalogEntry::to_case)
            .ok_or_else(|| ContractError::UnknownCase(name.to_string()))
    }

    /// Name of the entry equal to `actual`
    pub fn classify(&self, actual: &ErrorCase) -> Result<&'static str> {
        self.entries
            .iter()
            .find(|e| e.status_code == actual.status_code && e.message == actual.message)
            .map(|e| e.name)
            .ok_or_else(|| {
                warn!(status = actual.status_code, message = %actual.message, "error not in catalog");
                ContractError::UpstreamContractViolation {
                    status_code: actual.status_code,
                    message: actual.message.clone(),
                }
            })
    }

    /// Deep equality between `actual` and the named entry.
    pub fn assert_case(&self, name: &str, actual: &ErrorCase) -> Result<()> {
        let expected = self.get(name)?;
        if &expected == actual {
            return Ok(());
        }
        // An error the catalog has never seen is reported as such, not as a plain mismatch.
        self.classify(actual)?;
        Err(ContractError::Mismatch {
            case: name.to_string(),
            expected,
            actual: actual.clone(),
        })
    }

    /// Like [`assert_case`](Self::assert_case), accepting any of `names`.
    pub fn assert_any_case(&self, names: &[String], actual: &ErrorCase) -> Result<&'static str> {
        for name in names {
            self.get(name)?;
        }
        let observed = self.classify(actual)?;
        if names.iter().any(|n| n == observed) {
            Ok(observed)
        } else {
            Err(ContractError::Mismatch {
                case: names.join("|"),
                expected: self.get(names.first().map(String::as_str).unwrap_or(observed))?,
                actual: actual.clone(),
            })
        }
    }
}
