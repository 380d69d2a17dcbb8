//! Built-in field transforms, addressable by name from model manifests.

use super::{FieldValue, SchemaError, Transform, TransformError};
use std::collections::HashMap;

/// Named transforms available to manifests.
#[derive(Debug, Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, Transform>,
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TransformRegistry {
    /// Registry with no transforms.
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Registry pre-loaded with `trim`, `float`, `boolean` and `percent`.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Transform::new("trim", trim));
        registry.register(Transform::new("float", float));
        registry.register(Transform::new("boolean", boolean));
        registry.register(Transform::new("percent", percent));
        registry
    }

    /// Add or replace a transform under its own name.
    pub fn register(&mut self, transform: Transform) {
        self.transforms
            .insert(transform.name().to_string(), transform);
    }

    pub fn get(&self, name: &str) -> Option<&Transform> {
        self.transforms.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<Transform, SchemaError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownTransform(name.to_string()))
    }
}

fn trim(value: &str) -> Result<FieldValue, TransformError> {
    Ok(FieldValue::Text(value.trim().to_string()))
}

fn float(value: &str) -> Result<FieldValue, TransformError> {
    let trimmed = value.trim();
    parse_finite(trimmed)
        .map(FieldValue::Number)
        .ok_or_else(|| TransformError::new(format!("'{}' is not a number", trimmed)))
}

fn boolean(value: &str) -> Result<FieldValue, TransformError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(FieldValue::Number(1.0)),
        "false" | "no" | "off" | "0" => Ok(FieldValue::Number(0.0)),
        other => Err(TransformError::new(format!("'{}' is not a boolean", other))),
    }
}

fn percent(value: &str) -> Result<FieldValue, TransformError> {
    let trimmed = value.trim();
    let digits = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    let number = parse_finite(digits)
        .ok_or_else(|| TransformError::new(format!("'{}' is not a percentage", trimmed)))?;
    Ok(FieldValue::Number(number / 100.0))
}

fn parse_finite(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(name: &str, value: &str) -> Result<FieldValue, TransformError> {
        TransformRegistry::builtin()
            .resolve(name)
            .expect("builtin transform")
            .apply(value)
    }

    #[test]
    fn trim_strips_whitespace() {
        assert_eq!(apply("trim", "  x ").unwrap(), FieldValue::from("x"));
    }

    #[test]
    fn float_parses_numbers() {
        assert_eq!(apply("float", " 4.5").unwrap(), FieldValue::Number(4.5));
        assert!(apply("float", "4.5cm").is_err());
    }

    #[test]
    fn float_rejects_non_finite_values() {
        for value in ["nan", "NaN", "inf", "-infinity", "1e309"] {
            assert_eq!(
                apply("float", value).unwrap_err().to_string(),
                format!("'{}' is not a number", value)
            );
        }
    }

    #[test]
    fn boolean_accepts_common_spellings() {
        assert_eq!(apply("boolean", "Yes").unwrap(), FieldValue::Number(1.0));
        assert_eq!(apply("boolean", "off").unwrap(), FieldValue::Number(0.0));
        assert_eq!(
            apply("boolean", "maybe").unwrap_err().to_string(),
            "'maybe' is not a boolean"
        );
    }

    #[test]
    fn percent_divides_by_hundred() {
        assert_eq!(apply("percent", "42%").unwrap(), FieldValue::Number(0.42));
        assert_eq!(apply("percent", "1").unwrap(), FieldValue::Number(0.01));
        assert!(apply("percent", "%").is_err());
        assert!(apply("percent", "inf%").is_err());
    }

    #[test]
    fn unknown_transform_is_an_error() {
        let err = TransformRegistry::builtin().resolve("rot13").unwrap_err();
        assert_eq!(err, SchemaError::UnknownTransform("rot13".to_string()));
    }

    #[test]
    fn custom_transforms_can_be_registered() {
        let mut registry = TransformRegistry::empty();
        registry.register(Transform::new("double", |v: &str| {
            Ok(FieldValue::Number(v.parse::<f64>()? * 2.0))
        }));

        let value = registry.resolve("double").unwrap().apply("2").unwrap();
        assert_eq!(value, FieldValue::Number(4.0));
    }
}
