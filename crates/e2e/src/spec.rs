//! Declarative YAML API case specs

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stormcheck_common::ErrorCatalog;
use tracing::debug;

use crate::api::{ApiKeyMode, ApiResponse, Location, Units, WeatherClient, WeatherQuery};
use crate::error::{E2eError, E2eResult};
use crate::runner::TestCase;
use crate::suite::{names, ApiKey};

/// One API scenario: a request and what the response must look like
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCaseSpec {
    /// Unique name for this case
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub request: RequestSpec,

    pub expect: Expectation,
}

/// Request parameters. At most one location selector may be given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestSpec {
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default)]
    pub lon: Option<String>,
    /// Free-text city query
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub id: Option<u64>,
    /// `zip` or `zip,country`
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub units: Option<Units>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub api_key: KeySource,
    /// Literal `appid`; only valid with the default key source
    #[serde(default)]
    pub appid: Option<String>,
}

/// Where the `appid` comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// Configured key, or `appid` when set
    #[default]
    Default,
    Omit,
    /// The key created through the UI by the `api_key` fixture
    Fixture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expectation {
    pub status: u16,

    /// Catalog case, or list of acceptable cases
    #[serde(default)]
    pub error: Option<CaseExpectation>,

    #[serde(default)]
    pub coord: Option<CoordExpectation>,

    /// City name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaseExpectation {
    One(String),
    AnyOf(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordExpectation {
    pub lat: f64,
    pub lon: f64,
}

const COORD_TOLERANCE: f64 = 1e-9;

impl RequestSpec {
    pub fn location(&self) -> E2eResult<Location> {
        let selectors = [
            self.lat.is_some() || self.lon.is_some(),
            self.q.is_some(),
            self.id.is_some(),
            self.zip.is_some(),
        ];
        if selectors.iter().filter(|s| **s).count() > 1 {
            return Err(E2eError::SpecParse(
                "only one of lat/lon, q, id and zip may be set".to_string(),
            ));
        }

        Ok(match (&self.lat, &self.lon) {
            (Some(lat), Some(lon)) => Location::coordinates(lat.clone(), lon.clone()),
            (Some(_), None) | (None, Some(_)) => {
                return Err(E2eError::SpecParse("lat and lon must be set together".to_string()))
            }
            (None, None) => {
                if let Some(q) = &self.q {
                    Location::City(q.clone())
                } else if let Some(id) = self.id {
                    Location::CityId(id)
                } else if let Some(zip) = &self.zip {
                    Location::Zip {
                        zip: zip.clone(),
                        country: None,
                    }
                } else {
                    Location::None
                }
            }
        })
    }

    /// Build the query; `api_key` is the fixture key when the source asks for it
    pub fn to_query(&self, api_key: Option<&ApiKey>) -> E2eResult<WeatherQuery> {
        let mode = match (self.api_key, &self.appid) {
            (KeySource::Default, None) => ApiKeyMode::Default,
            (KeySource::Default, Some(appid)) => ApiKeyMode::Explicit(appid.clone()),
            (KeySource::Omit, None) => ApiKeyMode::Omit,
            (KeySource::Fixture, None) => {
                let key = api_key.ok_or_else(|| {
                    E2eError::Configuration("case needs the api_key fixture".to_string())
                })?;
                ApiKeyMode::Explicit(key.value.clone())
            }
            (_, Some(_)) => {
                return Err(E2eError::SpecParse(
                    "appid can only be combined with the default key source".to_string(),
                ))
            }
        };

        Ok(WeatherQuery {
            location: self.location()?,
            units: self.units,
            lang: self.lang.clone(),
            api_key: mode,
        })
    }
}

impl Expectation {
    /// Check a response against every expectation that is set
    pub fn check(&self, response: &ApiResponse) -> E2eResult<()> {
        response.expect_status(self.status)?;

        let catalog = ErrorCatalog::current_weather();
        match &self.error {
            Some(CaseExpectation::One(name)) => catalog.assert_case(name, &response.error()?)?,
            Some(CaseExpectation::AnyOf(names)) => {
                let observed = catalog.assert_any_case(names, &response.error()?)?;
                debug!(case = observed, "matched acceptable error case");
            }
            None => {}
        }

        if !response.is_success() {
            return Ok(());
        }

        let weather = response.weather()?;
        if let Some(coord) = &self.coord {
            let lat_ok = (weather.coord.lat - coord.lat).abs() < COORD_TOLERANCE;
            let lon_ok = (weather.coord.lon - coord.lon).abs() < COORD_TOLERANCE;
            if !lat_ok || !lon_ok {
                return Err(E2eError::AssertionFailed(format!(
                    "expected coord {{lat: {}, lon: {}}}, got {{lat: {}, lon: {}}}",
                    coord.lat, coord.lon, weather.coord.lat, weather.coord.lon
                )));
            }
        }
        if let Some(name) = &self.name {
            if &weather.name != name {
                return Err(E2eError::AssertionFailed(format!(
                    "expected city '{}', got '{}'",
                    name, weather.name
                )));
            }
        }
        if let Some(country) = &self.country {
            if &weather.sys.country != country {
                return Err(E2eError::AssertionFailed(format!(
                    "expected country '{}', got '{}'",
                    country, weather.sys.country
                )));
            }
        }
        Ok(())
    }
}

impl ApiCaseSpec {
    /// Parse a case from YAML and check it is well-formed
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load every `.yaml`/`.yml` case below `dir`, sorted by name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        specs.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = specs.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(E2eError::SpecParse(format!("duplicate case name '{}'", pair[0].name)));
        }
        Ok(specs)
    }

    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Location selectors and catalog names are checked before anything runs
    pub fn validate(&self) -> E2eResult<()> {
        self.request.location()?;
        self.request.to_query(Some(&ApiKey {
            name: String::new(),
            value: String::new(),
        }))?;

        let catalog = ErrorCatalog::current_weather();
        let names: Vec<&String> = match &self.expect.error {
            Some(CaseExpectation::One(name)) => vec![name],
            Some(CaseExpectation::AnyOf(names)) if names.is_empty() => {
                return Err(E2eError::SpecParse(format!("case '{}' lists no error cases", self.name)))
            }
            Some(CaseExpectation::AnyOf(names)) => names.iter().collect(),
            None => Vec::new(),
        };
        for name in names {
            catalog.get(name)?;
        }
        Ok(())
    }

    pub fn needs_api_key_fixture(&self) -> bool {
        self.request.api_key == KeySource::Fixture
    }

    /// A runnable test case resolving `weather_client` (and `api_key` when needed)
    pub fn into_test_case(self) -> TestCase {
        let name = self.name.clone();
        let tags = self.tags.clone();
        let spec = Arc::new(self);
        TestCase::new(&name, move |scope| {
            let spec = Arc::clone(&spec);
            async move {
                let client = scope.get::<WeatherClient>(names::WEATHER_CLIENT).await?;
                let api_key = if spec.needs_api_key_fixture() {
                    Some(scope.get::<ApiKey>(names::API_KEY).await?)
                } else {
                    None
                };
                let query = spec.request.to_query(api_key.as_deref())?;
                let response = client.current_weather(&query).await?;
                spec.expect.check(&response)
            }
        })
        .with_tags(tags)
    }
}
