//! Structural validation of untrusted JSON payloads
//!
//! A [`Shape`] describes the fields a payload must carry and their primitive
//! types. Validation walks the payload, fails closed on the first missing or
//! mistyped field, and produces a normalized copy that is then deserialized
//! into the typed contract.
//!
//! Two shapes coerce instead of rejecting: [`Shape::NumberLike`] and
//! [`Shape::IntegerLike`] accept a numeric string and rewrite it as a JSON
//! number. The weather API reports `cod` as `400` on some errors and `"404"`
//! on others, so the coercion is applied only where a field is declared with
//! one of these shapes. Every other field keeps strict typing.
//!
//! Keys the shape does not declare are carried through untouched.

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::error::ValidationError;

/// Declared shape of a JSON value
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    String,
    Number,
    Integer,
    Bool,
    /// A number, or a string that parses as a finite number
    NumberLike,
    /// An integer, or a string that parses as an integer
    IntegerLike,
    Array(Box<Shape>),
    Object(Vec<Field>),
    /// Anything, including null
    Any,
}

/// A named member of an object shape
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub shape: Shape,
    pub required: bool,
}

impl Field {
    pub fn required(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            shape,
            required: true,
        }
    }

    /// Optional fields may be absent or null; when present they must match.
    pub fn optional(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            shape,
            required: false,
        }
    }
}

/// A type whose JSON representation is validated against a [`Shape`]
/// before deserialization.
pub trait Contract: DeserializeOwned {
    fn shape() -> Shape;
}

/// Validate `payload` against `T`'s shape and deserialize the normalized value.
pub fn validate<T: Contract>(payload: &Value) -> Result<T, ValidationError> {
    let normalized = T::shape().normalize(payload)?;
    serde_json::from_value(normalized).map_err(|e| ValidationError::new("$", e.to_string()))
}

impl Shape {
    pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
        Shape::Object(fields.into_iter().collect())
    }

    pub fn array_of(item: Shape) -> Self {
        Shape::Array(Box::new(item))
    }

    /// Check `value` against this shape, returning the normalized value.
    pub fn normalize(&self, value: &Value) -> Result<Value, ValidationError> {
        self.normalize_at("$", value)
    }

    fn describe(&self) -> &'static str {
        match self {
            Shape::String => "string",
            Shape::Number => "number",
            Shape::Integer => "integer",
            Shape::Bool => "boolean",
            Shape::NumberLike => "number or numeric string",
            Shape::IntegerLike => "integer or integer string",
            Shape::Array(_) => "array",
            Shape::Object(_) => "object",
            Shape::Any => "any value",
        }
    }

    fn normalize_at(&self, path: &str, value: &Value) -> Result<Value, ValidationError> {
        let mismatch = || {
            ValidationError::new(
                path,
                format!("expected {}, found {}", self.describe(), kind_of(value)),
            )
        };

        match (self, value) {
            (Shape::Any, v) => Ok(v.clone()),
            (Shape::String, Value::String(_)) => Ok(value.clone()),
            (Shape::Bool, Value::Bool(_)) => Ok(value.clone()),
            (Shape::Number, Value::Number(_)) => Ok(value.clone()),
            (Shape::Integer, Value::Number(n)) if is_integer(n) => Ok(value.clone()),
            (Shape::NumberLike, Value::Number(_)) => Ok(value.clone()),
            (Shape::NumberLike, Value::String(s)) => {
                let parsed = s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .ok_or_else(|| {
                        ValidationError::new(path, format!("{:?} is not a numeric string", s))
                    })?;
                debug!(path, raw = %s, "coerced numeric string");
                Ok(Value::Number(parsed))
            }
            (Shape::IntegerLike, Value::Number(n)) if is_integer(n) => Ok(value.clone()),
            (Shape::IntegerLike, Value::String(s)) => {
                let parsed = s.trim().parse::<i64>().map_err(|_| {
                    ValidationError::new(path, format!("{:?} is not an integer string", s))
                })?;
                debug!(path, raw = %s, "coerced integer string");
                Ok(Value::Number(parsed.into()))
            }
            (Shape::Array(item), Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, v)| item.normalize_at(&format!("{}[{}]", path, i), v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (Shape::Object(fields), Value::Object(map)) => {
                let mut out: Map<String, Value> = map.clone();
                for field in fields {
                    let field_path = format!("{}.{}", path, field.name);
                    match map.get(field.name) {
                        None | Some(Value::Null) if !field.required => {}
                        None => {
                            return Err(ValidationError::new(field_path, "required field is missing"));
                        }
                        Some(v) => {
                            let normalized = field.shape.normalize_at(&field_path, v)?;
                            out.insert(field.name.to_string(), normalized);
                        }
                    }
                }
                Ok(Value::Object(out))
            }
            _ => Err(mismatch()),
        }
    }
}

fn is_integer(n: &Number) -> bool {
    n.is_i64() || n.is_u64()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point() -> Shape {
        Shape::object([
            Field::required("x", Shape::NumberLike),
            Field::optional("label", Shape::String),
        ])
    }

    #[test]
    fn test_numeric_string_is_coerced() {
        let out = point().normalize(&json!({ "x": "1.5" })).unwrap();
        assert_eq!(out, json!({ "x": 1.5 }));
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let out = point().normalize(&json!({ "x": 2, "extra": [1, 2] })).unwrap();
        assert_eq!(out["extra"], json!([1, 2]));
    }

    #[test]
    fn test_missing_required_field_names_path() {
        let err = point().normalize(&json!({ "label": "a" })).unwrap_err();
        assert_eq!(err.path, "$.x");
    }

    #[test]
    fn test_optional_null_is_accepted() {
        assert!(point().normalize(&json!({ "x": 1, "label": null })).is_ok());
    }

    #[test]
    fn test_nested_array_path() {
        let shape = Shape::object([Field::required(
            "points",
            Shape::array_of(point()),
        )]);
        let err = shape
            .normalize(&json!({ "points": [{ "x": 1 }, { "x": true }] }))
            .unwrap_err();
        assert_eq!(err.path, "$.points[1].x");
        assert!(err.reason.contains("found boolean"));
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let err = Shape::Integer.normalize(&json!(4.5)).unwrap_err();
        assert_eq!(err.path, "$");
        assert!(Shape::IntegerLike.normalize(&json!("4.5")).is_err());
        assert!(Shape::NumberLike.normalize(&json!("north")).is_err());
    }
}
