//! Current weather payloads and normalized error responses

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::schema::{validate, Contract, Field, Shape};

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

/// One weather condition entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: i64,
    #[serde(default)]
    pub main: Option<String>,
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Temperature and atmospheric readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: f64,
    pub humidity: f64,
    #[serde(default)]
    pub sea_level: Option<f64>,
    #[serde(default)]
    pub grnd_level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sys {
    pub country: String,
    #[serde(default)]
    pub sunrise: Option<i64>,
    #[serde(default)]
    pub sunset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    #[serde(default)]
    pub deg: Option<f64>,
    #[serde(default)]
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clouds {
    pub all: f64,
}

/// Successful current weather response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub coord: Coord,
    pub weather: Vec<Condition>,
    pub main: MainReadings,
    pub sys: Sys,
    pub name: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub dt: Option<i64>,
    #[serde(default)]
    pub timezone: Option<i64>,
    #[serde(default)]
    pub visibility: Option<i64>,
    #[serde(default)]
    pub wind: Option<Wind>,
    #[serde(default)]
    pub clouds: Option<Clouds>,
}

impl Contract for WeatherResponse {
    fn shape() -> Shape {
        Shape::object([
            Field::required(
                "coord",
                Shape::object([
                    Field::required("lat", Shape::NumberLike),
                    Field::required("lon", Shape::NumberLike),
                ]),
            ),
            Field::required(
                "weather",
                Shape::array_of(Shape::object([
                    Field::required("id", Shape::Integer),
                    Field::optional("main", Shape::String),
                    Field::required("description", Shape::String),
                    Field::optional("icon", Shape::String),
                ])),
            ),
            Field::required(
                "main",
                Shape::object([
                    Field::required("temp", Shape::Number),
                    Field::required("feels_like", Shape::Number),
                    Field::required("temp_min", Shape::Number),
                    Field::required("temp_max", Shape::Number),
                    Field::required("pressure", Shape::Number),
                    Field::required("humidity", Shape::Number),
                    Field::optional("sea_level", Shape::Number),
                    Field::optional("grnd_level", Shape::Number),
                ]),
            ),
            Field::required(
                "sys",
                Shape::object([
                    Field::required("country", Shape::String),
                    Field::optional("sunrise", Shape::Integer),
                    Field::optional("sunset", Shape::Integer),
                ]),
            ),
            Field::required("name", Shape::String),
            Field::optional("id", Shape::Integer),
            Field::optional("dt", Shape::Integer),
            Field::optional("timezone", Shape::Integer),
            Field::optional("visibility", Shape::Integer),
            Field::optional(
                "wind",
                Shape::object([
                    Field::required("speed", Shape::Number),
                    Field::optional("deg", Shape::Number),
                    Field::optional("gust", Shape::Number),
                ]),
            ),
            Field::optional("clouds", Shape::object([Field::required("all", Shape::Number)])),
        ])
    }
}

/// Error body as sent on the wire. `cod` arrives as a number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    cod: i64,
    message: String,
}

impl Contract for ErrorResponse {
    fn shape() -> Shape {
        Shape::object([
            Field::required("cod", Shape::IntegerLike),
            Field::required("message", Shape::String),
        ])
    }
}

/// Canonical error shape: `{"statusCode": 404, "message": "city not found"}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCase {
    pub status_code: u16,
    pub message: String,
}

impl ErrorCase {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    /// Validate a raw upstream error body and normalize it.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ValidationError> {
        let raw: ErrorResponse = validate(payload)?;
        let status_code = u16::try_from(raw.cod)
            .ok()
            .filter(|code| (100..=599).contains(code))
            .ok_or_else(|| {
                ValidationError::new("$.cod", format!("{} is not an HTTP status code", raw.cod))
            })?;
        Ok(Self {
            status_code,
            message: raw.message,
        })
    }
}
