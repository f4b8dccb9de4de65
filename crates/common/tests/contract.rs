//! Contract validation against recorded payload shapes

use serde_json::json;
use stormcheck_common::catalog::{self, ErrorCatalog};
use stormcheck_common::{validate, ContractError, Coord, ErrorCase, WeatherResponse};
use test_case::test_case;

fn weather_payload(lat: serde_json::Value, lon: serde_json::Value) -> serde_json::Value {
    json!({
        "coord": { "lon": lon, "lat": lat },
        "weather": [
            { "id": 501, "main": "Rain", "description": "moderate rain", "icon": "10d" }
        ],
        "base": "stations",
        "main": {
            "temp": 298.48,
            "feels_like": 298.74,
            "temp_min": 297.56,
            "temp_max": 300.05,
            "pressure": 1015,
            "humidity": 64,
            "sea_level": 1015,
            "grnd_level": 933
        },
        "visibility": 10000,
        "wind": { "speed": 0.62, "deg": 349, "gust": 1.18 },
        "rain": { "1h": 3.16 },
        "clouds": { "all": 100 },
        "dt": 1661870592,
        "sys": { "type": 2, "id": 2075663, "country": "IT", "sunrise": 1661834187, "sunset": 1661882248 },
        "timezone": 7200,
        "id": 3163858,
        "name": "Zocca",
        "cod": 200
    })
}

#[test_case(json!(44.34), json!(10.99) ; "numeric coordinates")]
#[test_case(json!("44.34"), json!("10.99") ; "string coordinates")]
#[test_case(json!("44.34"), json!(10.99) ; "mixed coordinates")]
fn weather_coord_round_trips_as_numbers(lat: serde_json::Value, lon: serde_json::Value) {
    let parsed: WeatherResponse = validate(&weather_payload(lat, lon)).expect("valid payload");
    assert_eq!(parsed.coord, Coord { lat: 44.34, lon: 10.99 });
    assert_eq!(parsed.name, "Zocca");
    assert_eq!(parsed.sys.country, "IT");
    assert_eq!(parsed.weather[0].description, "moderate rain");
}

#[test]
fn weather_missing_country_names_the_path() {
    let mut payload = weather_payload(json!(1.0), json!(2.0));
    payload["sys"].as_object_mut().unwrap().remove("country");
    let err = validate::<WeatherResponse>(&payload).unwrap_err();
    assert_eq!(err.path, "$.sys.country");
}

#[test]
fn weather_wrong_primitive_is_rejected() {
    let mut payload = weather_payload(json!(1.0), json!(2.0));
    payload["main"]["temp"] = json!("warm");
    let err = validate::<WeatherResponse>(&payload).unwrap_err();
    assert_eq!(err.path, "$.main.temp");
}

#[test]
fn string_cod_normalizes_and_matches_city_not_found() {
    let actual = ErrorCase::from_payload(&json!({ "cod": "404", "message": "city not found" }))
        .expect("valid error payload");
    assert_eq!(actual, ErrorCase::new(404, "city not found"));

    let catalog = ErrorCatalog::current_weather();
    catalog
        .assert_case(catalog::CITY_NOT_FOUND, &actual)
        .expect("matches catalog entry");
    assert_eq!(catalog.classify(&actual).unwrap(), catalog::CITY_NOT_FOUND);
}

#[test_case(json!({ "cod": 400, "message": "Nothing to geocode" }), catalog::NOTHING_TO_GEOCODE ; "nothing to geocode")]
#[test_case(
    json!({ "cod": 401, "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info." }),
    catalog::INVALID_API_KEY
    ; "invalid api key"
)]
#[test_case(json!({ "cod": "400", "message": "wrong latitude" }), catalog::WRONG_LATITUDE ; "wrong latitude as string")]
fn numeric_and_string_cod_classify(payload: serde_json::Value, expected: &str) {
    let actual = ErrorCase::from_payload(&payload).unwrap();
    assert_eq!(ErrorCatalog::current_weather().classify(&actual).unwrap(), expected);
}

#[test]
fn unknown_error_shape_fails_loudly() {
    let actual = ErrorCase::from_payload(&json!({
        "cod": 429,
        "message": "Your account is temporary blocked"
    }))
    .unwrap();
    let err = ErrorCatalog::current_weather().classify(&actual).unwrap_err();
    assert!(matches!(err, ContractError::UpstreamContractViolation { status_code: 429, .. }));
}

#[test]
fn non_numeric_cod_is_a_validation_error() {
    let err = ErrorCase::from_payload(&json!({ "cod": "abc", "message": "x" })).unwrap_err();
    assert_eq!(err.path, "$.cod");
}
