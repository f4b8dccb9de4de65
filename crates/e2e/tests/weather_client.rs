//! Weather API client against a local mock server

use std::path::Path;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use stormcheck_common::catalog::{CITY_NOT_FOUND, INVALID_API_KEY, NOTHING_TO_GEOCODE};
use stormcheck_common::{ContractError, Coord, ErrorCase, ErrorCatalog};
use stormcheck_e2e::fixture::{FixtureDescriptor, FixtureRegistry, Setup};
use stormcheck_e2e::suite::names;
use stormcheck_e2e::{
    ApiCaseSpec, ApiKeyMode, Location, RunnerConfig, TestOutcome, TestRunner, Units, WeatherClient, WeatherQuery,
};

const KEY: &str = "0123456789abcdef0123456789abcdef";

const STOCKHOLM: &str = r#"{
    "coord": { "lon": "10.99", "lat": 44.34 },
    "weather": [{ "id": 501, "main": "Rain", "description": "moderate rain", "icon": "10d" }],
    "base": "stations",
    "main": {
        "temp": 298.48, "feels_like": 298.74, "temp_min": 297.56, "temp_max": 300.05,
        "pressure": 1015, "humidity": 64, "sea_level": 1015, "grnd_level": 933
    },
    "visibility": 10000,
    "wind": { "speed": 0.62, "deg": 349, "gust": 1.18 },
    "clouds": { "all": 100 },
    "dt": 1661870592,
    "sys": { "type": 2, "id": 2075663, "country": "IT", "sunrise": 1661834187, "sunset": 1661882248 },
    "timezone": 7200,
    "id": 3163858,
    "name": "Zocca",
    "cod": 200
}"#;

fn client(server: &MockServer) -> WeatherClient {
    WeatherClient::new(&server.base_url(), KEY, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_coordinates_round_trip_as_numbers() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/data/2.5/weather")
            .query_param("lat", "44.34")
            .query_param("lon", "10.99")
            .query_param("units", "metric")
            .query_param("appid", KEY);
        then.status(200)
            .header("content-type", "application/json")
            .body(STOCKHOLM);
    });

    let response = client(&server)
        .current_weather(&WeatherQuery::new(Location::coordinates("44.34", "10.99")).units(Units::Metric))
        .await
        .unwrap();

    mock.assert();
    assert_eq!(response.status, 200);
    let weather = response.weather().unwrap();
    assert_eq!(weather.coord, Coord { lat: 44.34, lon: 10.99 });
    assert_eq!(weather.sys.country, "IT");
    assert_eq!(weather.weather[0].description, "moderate rain");
}

#[tokio::test]
async fn test_missing_location_is_nothing_to_geocode() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/data/2.5/weather").query_param("appid", KEY);
        then.status(400)
            .json_body(json!({ "cod": "400", "message": "Nothing to geocode" }));
    });

    let response = client(&server).current_weather(&WeatherQuery::default()).await.unwrap();

    mock.assert();
    assert_eq!(response.status, 400);
    let error = response.error().unwrap();
    assert_eq!(
        serde_json::to_value(&error).unwrap(),
        json!({ "statusCode": 400, "message": "Nothing to geocode" })
    );
    ErrorCatalog::current_weather()
        .assert_case(NOTHING_TO_GEOCODE, &error)
        .unwrap();
}

#[tokio::test]
async fn test_explicit_unactivated_key_is_unauthorized() {
    let fresh = "ffffffffffffffffffffffffffffffff";
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/data/2.5/weather").query_param("appid", fresh);
        then.status(401).json_body(json!({
            "cod": 401,
            "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."
        }));
    });

    let query = WeatherQuery::new(Location::coordinates("44.34", "10.99"))
        .api_key(ApiKeyMode::Explicit(fresh.to_string()));
    let response = client(&server).current_weather(&query).await.unwrap();

    mock.assert();
    assert_eq!(response.status, 401);
    ErrorCatalog::current_weather()
        .assert_case(INVALID_API_KEY, &response.error().unwrap())
        .unwrap();
}

#[tokio::test]
async fn test_string_status_code_matches_city_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/data/2.5/weather").query_param("q", "Atlantis");
        then.status(404).body(r#"{"cod":"404","message":"city not found"}"#);
    });

    let response = client(&server)
        .current_weather(&WeatherQuery::new(Location::city("Atlantis")))
        .await
        .unwrap();

    let error = response.error().unwrap();
    assert_eq!(error, ErrorCase::new(404, "city not found"));
    assert_eq!(ErrorCatalog::current_weather().classify(&error).unwrap(), CITY_NOT_FOUND);
}

#[tokio::test]
async fn test_unseen_error_is_contract_violation() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/data/2.5/weather");
        then.status(429).json_body(json!({ "cod": 429, "message": "rate limited" }));
    });

    let response = client(&server)
        .current_weather(&WeatherQuery::new(Location::CityId(593116)))
        .await
        .unwrap();

    let err = ErrorCatalog::current_weather()
        .assert_case(INVALID_API_KEY, &response.error().unwrap())
        .unwrap_err();
    assert!(matches!(err, ContractError::UpstreamContractViolation { status_code: 429, .. }));
}

#[tokio::test]
async fn test_non_json_body_is_kept_as_text() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/data/2.5/weather");
        then.status(502).body("Bad Gateway");
    });

    let response = client(&server).current_weather(&WeatherQuery::default()).await.unwrap();
    assert_eq!(response.status, 502);
    assert_eq!(response.body, json!("Bad Gateway"));
    assert!(response.error().is_err());
}

#[tokio::test]
async fn test_yaml_cases_run_through_runner() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/data/2.5/weather").query_param("lat", "44.34");
        then.status(200).body(STOCKHOLM);
    });
    server.mock(|when, then| {
        when.method(GET).path("/data/2.5/weather").query_param("lat", "91");
        then.status(400).json_body(json!({ "cod": "400", "message": "wrong latitude" }));
    });

    let base_url = server.base_url();
    let registry = FixtureRegistry::new().with(FixtureDescriptor::test(names::WEATHER_CLIENT, &[], move |_| {
        let base_url = base_url.clone();
        async move { Ok(Setup::new(WeatherClient::new(&base_url, KEY, Duration::from_secs(5))?)) }
    }));
    let mut runner = TestRunner::new(registry, RunnerConfig::default()).unwrap();

    let cases = [
        r#"
name: coordinates
tags: [api]
request: { lat: "44.34", lon: "10.99" }
expect: { status: 200, coord: { lat: 44.34, lon: 10.99 } }
"#,
        r#"
name: out-of-range
tags: [api]
request: { lat: "91", lon: "10.99" }
expect: { status: 400, error: [wrongLatitude, nothingToGeocode] }
"#,
        r#"
name: wrong-city
request: { lat: "44.34", lon: "10.99" }
expect: { status: 200, name: Stockholm }
"#,
    ];
    for yaml in cases {
        runner.add(ApiCaseSpec::from_yaml(yaml).unwrap().into_test_case());
    }

    let tagged = runner.run_tagged("api").await;
    assert_eq!(tagged.total, 2);
    assert_eq!(tagged.passed, 2, "{:?}", tagged.results);

    let all = runner.run_all().await;
    assert_eq!(all.failed, 1);
    let failed = all.results.iter().find(|r| r.outcome == TestOutcome::Failed).unwrap();
    assert_eq!(failed.name, "wrong-city");
    assert_eq!(failed.fixtures, [names::WEATHER_CLIENT]);
}

#[test]
fn test_bundled_specs_load() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("specs");
    let specs = ApiCaseSpec::load_all(&dir).unwrap();
    assert_eq!(specs.len(), 12);
    assert_eq!(ApiCaseSpec::filter_by_tag(&specs, "smoke").len(), 2);
    assert_eq!(specs.iter().filter(|s| s.needs_api_key_fixture()).count(), 1);
}
