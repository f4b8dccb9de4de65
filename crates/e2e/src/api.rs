//! Weather API client
//!
//! Thin wrapper over `reqwest` for the current weather endpoint. Responses are
//! returned raw; [`ApiResponse::weather`] and [`ApiResponse::error`] run the
//! body through the contract validator.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stormcheck_common::{validate, ErrorCase, ValidationError, WeatherResponse};
use tracing::debug;

use crate::config::HarnessConfig;
use crate::error::{E2eError, E2eResult};

/// Path of the current weather endpoint
pub const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";

/// How the location is selected. Coordinates stay strings so malformed
/// values reach the upstream untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Coordinates { lat: String, lon: String },
    /// Free-text `q`, e.g. `New York,NY,US`
    City(String),
    CityId(u64),
    Zip {
        zip: String,
        #[serde(default)]
        country: Option<String>,
    },
    #[default]
    None,
}

impl Location {
    pub fn coordinates(lat: impl Into<String>, lon: impl Into<String>) -> Self {
        Location::Coordinates {
            lat: lat.into(),
            lon: lon.into(),
        }
    }

    pub fn city(query: impl Into<String>) -> Self {
        Location::City(query.into())
    }

    pub fn zip(zip: impl Into<String>, country: impl Into<String>) -> Self {
        Location::Zip {
            zip: zip.into(),
            country: Some(country.into()),
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Location::Coordinates { lat, lon } => vec![("lat", lat.clone()), ("lon", lon.clone())],
            Location::City(q) => vec![("q", q.clone())],
            Location::CityId(id) => vec![("id", id.to_string())],
            Location::Zip { zip, country: Some(country) } => vec![("zip", format!("{},{}", zip, country))],
            Location::Zip { zip, country: None } => vec![("zip", zip.clone())],
            Location::None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Standard,
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Standard => "standard",
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

/// Which `appid` is sent
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ApiKeyMode {
    /// The configured key
    #[default]
    Default,
    /// No `appid` parameter at all
    Omit,
    Explicit(String),
}

/// Parameters of one current weather request
#[derive(Debug, Clone, Default)]
pub struct WeatherQuery {
    pub location: Location,
    pub units: Option<Units>,
    pub lang: Option<String>,
    pub api_key: ApiKeyMode,
}

impl WeatherQuery {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            ..Default::default()
        }
    }

    pub fn units(mut self, units: Units) -> Self {
        self.units = Some(units);
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn api_key(mut self, mode: ApiKeyMode) -> Self {
        self.api_key = mode;
        self
    }

    pub fn without_api_key(self) -> Self {
        self.api_key(ApiKeyMode::Omit)
    }
}

/// Status and raw JSON body of a response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Validate the body as a weather payload
    pub fn weather(&self) -> Result<WeatherResponse, ValidationError> {
        validate::<WeatherResponse>(&self.body)
    }

    /// Validate and normalize the body as an error payload
    pub fn error(&self) -> Result<ErrorCase, ValidationError> {
        ErrorCase::from_payload(&self.body)
    }

    pub fn expect_status(&self, expected: u16) -> E2eResult<&Self> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(E2eError::AssertionFailed(format!(
                "expected status {}, got {}: {}",
                expected, self.status, self.body
            )))
        }
    }
}

/// Client for the weather API
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl WeatherClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> E2eResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| E2eError::Configuration(format!("invalid API base URL {}: {}", base_url, e)))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &HarnessConfig) -> E2eResult<Self> {
        Self::new(&config.base_api_url, config.api_key.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Query parameters in the order they are sent
    pub fn params(&self, query: &WeatherQuery) -> Vec<(&'static str, String)> {
        let mut params = query.location.params();
        if let Some(units) = query.units {
            params.push(("units", units.as_str().to_string()));
        }
        if let Some(lang) = &query.lang {
            params.push(("lang", lang.clone()));
        }
        match &query.api_key {
            ApiKeyMode::Default => params.push(("appid", self.api_key.clone())),
            ApiKeyMode::Explicit(key) => params.push(("appid", key.clone())),
            ApiKeyMode::Omit => {}
        }
        params
    }

    /// `GET /data/2.5/weather`
    pub async fn current_weather(&self, query: &WeatherQuery) -> E2eResult<ApiResponse> {
        let url = self.base_url.join(CURRENT_WEATHER_PATH).map_err(|e| {
            E2eError::Configuration(format!("cannot build endpoint URL: {}", e))
        })?;

        debug!(url = %url, location = ?query.location, "GET current weather");
        let response = self.http.get(url).query(&self.params(query)).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        debug!(status, "current weather response");
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> WeatherClient {
        WeatherClient::new("https://api.example.org", "k".repeat(32), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_params_for_zip_and_options() {
        let query = WeatherQuery::new(Location::zip("00100", "FI"))
            .units(Units::Metric)
            .lang("fi");
        let params = client().params(&query);
        assert_eq!(params[0], ("zip", "00100,FI".to_string()));
        assert_eq!(params[1], ("units", "metric".to_string()));
        assert_eq!(params[2], ("lang", "fi".to_string()));
        assert_eq!(params[3].0, "appid");
    }

    #[test]
    fn test_omitted_key_and_no_location() {
        let params = client().params(&WeatherQuery::default().without_api_key());
        assert!(params.is_empty());
    }

    #[test]
    fn test_expect_status() {
        let response = ApiResponse {
            status: 404,
            body: serde_json::json!({ "cod": "404", "message": "city not found" }),
        };
        assert!(response.expect_status(404).is_ok());
        assert!(matches!(response.expect_status(200), Err(E2eError::AssertionFailed(_))));
        assert_eq!(response.error().unwrap(), ErrorCase::new(404, "city not found"));
    }
}
