//! stormcheck common library
//!
//! Contract validation for the weather API: declared payload shapes with
//! documented coercions, typed weather and error payloads, and the catalog of
//! expected error responses.

pub mod catalog;
pub mod error;
pub mod schema;
pub mod weather;

pub use catalog::{CatalogEntry, ErrorCatalog};
pub use error::{ContractError, Result, ValidationError};
pub use schema::{validate, Contract, Field, Shape};
pub use weather::{Condition, Coord, ErrorCase, MainReadings, Sys, WeatherResponse};

/// stormcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
