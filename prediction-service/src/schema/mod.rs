//! Declarative input schemas.
//!
//! A [`Schema`] is an ordered list of [`FieldDescriptor`]s. Validating raw
//! form input against it yields either one cleaned value per field, in
//! schema order, or a per-field error report. Partial results are never
//! exposed: a single failing field makes the whole call fail.

pub mod transforms;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use transforms::TransformRegistry;

/// Raw request input: field name to submitted string.
pub type RawInput = HashMap<String, String>;

/// A single field value, either as submitted text or as a number produced by
/// a default or a transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Text rendering handed to transforms.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Number(n) => Cow::Owned(n.to_string()),
            FieldValue::Text(s) => Cow::Borrowed(s),
        }
    }

    /// Coerce to a finite float. Text is trimmed before parsing; `nan`,
    /// `inf` and out-of-range literals are rejected.
    pub fn to_f64(&self) -> Result<f64, NonNumeric> {
        let parsed = match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
        };
        parsed.filter(|n| n.is_finite()).ok_or_else(|| NonNumeric {
            position: 0,
            value: self.to_string(),
        })
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// A value that could not be read as a float.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("could not convert string to float: '{value}'")]
pub struct NonNumeric {
    /// Index of the offending value in the cleaned sequence.
    pub position: usize,
    pub value: String,
}

/// Convert cleaned values to a numeric vector, preserving order.
pub fn to_vector(values: &[FieldValue]) -> Result<Vec<f64>, NonNumeric> {
    values
        .iter()
        .enumerate()
        .map(|(position, value)| {
            value
                .to_f64()
                .map_err(|err| NonNumeric { position, ..err })
        })
        .collect()
}

/// Failure raised by a transform function.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct TransformError(String);

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<std::num::ParseFloatError> for TransformError {
    fn from(err: std::num::ParseFloatError) -> Self {
        Self(err.to_string())
    }
}

type TransformFn = dyn Fn(&str) -> Result<FieldValue, TransformError> + Send + Sync;

/// A named, shareable field transform.
#[derive(Clone)]
pub struct Transform {
    name: String,
    func: Arc<TransformFn>,
}

impl Transform {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> Result<FieldValue, TransformError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, value: &str) -> Result<FieldValue, TransformError> {
        (self.func)(value)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform").field("name", &self.name).finish()
    }
}

/// Describes one expected input field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    default: Option<FieldValue>,
    transform: Option<Transform>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            transform: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Attach a closure as this field's transform.
    pub fn with_transform_fn<F>(self, func: F) -> Self
    where
        F: Fn(&str) -> Result<FieldValue, TransformError> + Send + Sync + 'static,
    {
        let name = self.name.clone();
        self.with_transform(Transform::new(name, func))
    }

    /// Attach the transform registered under `transform` in `registry`.
    pub fn with_named_transform(
        self,
        transform: &str,
        registry: &TransformRegistry,
    ) -> Result<Self, SchemaError> {
        Ok(self.with_transform(registry.resolve(transform)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> Option<&FieldValue> {
        self.default.as_ref()
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    fn clean(&self, raw: Option<&str>) -> Result<FieldValue, FieldError> {
        let value = match (raw, &self.default) {
            (Some(raw), _) => FieldValue::Text(raw.to_string()),
            (None, Some(default)) => default.clone(),
            (None, None) => return Err(FieldError::Missing),
        };

        match &self.transform {
            Some(transform) => transform
                .apply(&value.as_text())
                .map_err(FieldError::TransformFailed),
            None => Ok(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("field names must not be empty")]
    EmptyName,

    #[error("duplicate field '{0}'")]
    DuplicateField(String),

    #[error("unknown transform '{0}'")]
    UnknownTransform(String),
}

/// Why a single field failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("missing and no default")]
    Missing,

    #[error("transformation failed: {0}")]
    TransformFailed(TransformError),
}

/// Per-field error report. Empty means the input was valid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors(BTreeMap<String, FieldError>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldError)> {
        self.0.iter().map(|(name, err)| (name.as_str(), err))
    }

    pub fn insert(&mut self, field: impl Into<String>, error: FieldError) {
        self.0.insert(field.into(), error);
    }

    /// Field name to human-readable message.
    pub fn messages(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(name, err)| (name.clone(), err.to_string()))
            .collect()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, err)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", name, err)?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

/// Outcome of [`Schema::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    cleaned: Option<Vec<FieldValue>>,
    errors: FieldErrors,
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Cleaned values in schema order, or `None` if any field failed.
    pub fn cleaned(&self) -> Option<&[FieldValue]> {
        self.cleaned.as_deref()
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn into_result(self) -> Result<Vec<FieldValue>, FieldErrors> {
        match self.cleaned {
            Some(cleaned) if self.errors.is_empty() => Ok(cleaned),
            _ => Err(self.errors),
        }
    }
}

/// Ordered set of uniquely named fields.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if field.name.is_empty() {
                return Err(SchemaError::EmptyName);
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate `input`, visiting every field so the report is complete.
    pub fn validate(&self, input: &RawInput) -> Validation {
        let mut cleaned = Vec::with_capacity(self.fields.len());
        let mut errors = FieldErrors::default();

        for field in &self.fields {
            match field.clean(input.get(&field.name).map(String::as_str)) {
                Ok(value) => cleaned.push(value),
                Err(err) => errors.insert(field.name.clone(), err),
            }
        }

        Validation {
            cleaned: errors.is_empty().then_some(cleaned),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(pairs: &[(&str, &str)]) -> RawInput {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn failing_transform(_: &str) -> Result<FieldValue, TransformError> {
        Err(TransformError::new("always fails"))
    }

    #[test]
    fn all_fields_present_keeps_declared_order() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("b"),
            FieldDescriptor::new("a"),
            FieldDescriptor::new("c"),
        ])
        .unwrap();

        let result = schema.validate(&input(&[("a", "1"), ("b", "2"), ("c", "3")]));

        assert!(result.is_ok());
        assert_eq!(
            result.cleaned().unwrap(),
            &[
                FieldValue::from("2"),
                FieldValue::from("1"),
                FieldValue::from("3")
            ]
        );
    }

    #[test]
    fn missing_field_without_default_fails() {
        let schema = Schema::new(vec![FieldDescriptor::new("x")]).unwrap();

        let result = schema.validate(&RawInput::new());

        assert!(!result.is_ok());
        assert!(result.cleaned().is_none());
        assert_eq!(result.errors().get("x"), Some(&FieldError::Missing));
    }

    #[test]
    fn missing_field_with_default_uses_default() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("a"),
            FieldDescriptor::new("b").with_default(5.0),
        ])
        .unwrap();

        let result = schema.validate(&input(&[("a", "1")]));

        assert_eq!(
            result.into_result().unwrap(),
            vec![FieldValue::from("1"), FieldValue::Number(5.0)]
        );
    }

    #[test]
    fn failing_transform_hides_all_cleaned_data() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("ok"),
            FieldDescriptor::new("bad").with_transform_fn(failing_transform),
        ])
        .unwrap();

        let result = schema.validate(&input(&[("ok", "1"), ("bad", "2")]));

        assert!(result.cleaned().is_none());
        assert!(!result.errors().contains("ok"));
        assert_eq!(
            result.errors().get("bad").unwrap().to_string(),
            "transformation failed: always fails"
        );
    }

    #[test]
    fn every_failing_field_is_reported() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("a"),
            FieldDescriptor::new("b").with_transform_fn(failing_transform),
            FieldDescriptor::new("c"),
        ])
        .unwrap();

        let errors = schema
            .validate(&input(&[("b", "x")]))
            .into_result()
            .unwrap_err();

        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.to_string(),
            "a: missing and no default; b: transformation failed: always fails; c: missing and no default"
        );
    }

    #[test]
    fn transform_replaces_value() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("n").with_transform_fn(|s| Ok(FieldValue::Number(s.len() as f64))),
        ])
        .unwrap();

        let cleaned = schema
            .validate(&input(&[("n", "abcd")]))
            .into_result()
            .unwrap();

        assert_eq!(cleaned, vec![FieldValue::Number(4.0)]);
    }

    #[test]
    fn default_is_passed_through_transform() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("n")
                .with_default(2.5)
                .with_transform_fn(|s| Ok(FieldValue::Text(format!("<{}>", s)))),
        ])
        .unwrap();

        let cleaned = schema.validate(&RawInput::new()).into_result().unwrap();

        assert_eq!(cleaned, vec![FieldValue::from("<2.5>")]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = Schema::new(vec![FieldDescriptor::new("a"), FieldDescriptor::new("a")]);
        assert_eq!(
            result.unwrap_err(),
            SchemaError::DuplicateField("a".to_string())
        );
    }

    #[test]
    fn empty_names_are_rejected() {
        let result = Schema::new(vec![FieldDescriptor::new("")]);
        assert_eq!(result.unwrap_err(), SchemaError::EmptyName);
    }

    #[test]
    fn to_vector_converts_in_order() {
        let vector = to_vector(&[FieldValue::from("1"), FieldValue::from(" 3 ")]).unwrap();
        assert_eq!(vector, vec![1.0, 3.0]);
    }

    #[test]
    fn to_vector_rejects_non_numeric() {
        let err = to_vector(&[FieldValue::from("1"), FieldValue::from("3b")]).unwrap_err();
        assert_eq!(err.position, 1);
        assert_eq!(err.value, "3b");
    }

    #[test]
    fn to_vector_rejects_non_finite() {
        let err = to_vector(&[FieldValue::from("nan")]).unwrap_err();
        assert_eq!(err.position, 0);
        assert_eq!(err.to_string(), "could not convert string to float: 'nan'");

        assert!(to_vector(&[FieldValue::from("1"), FieldValue::from("inf")]).is_err());
        assert!(to_vector(&[FieldValue::from("1e309")]).is_err());
        assert!(to_vector(&[FieldValue::Number(f64::NAN)]).is_err());
    }

    #[test]
    fn named_transform_is_resolved_from_registry() {
        let registry = TransformRegistry::builtin();
        let schema = Schema::new(vec![FieldDescriptor::new("rate")
            .with_named_transform("percent", &registry)
            .unwrap()])
        .unwrap();

        let cleaned = schema
            .validate(&input(&[("rate", "25%")]))
            .into_result()
            .unwrap();
        assert_eq!(cleaned, vec![FieldValue::Number(0.25)]);
        assert_eq!(schema.fields()[0].transform().unwrap().name(), "percent");
    }

    #[test]
    fn unknown_named_transform_is_rejected() {
        let err = FieldDescriptor::new("x")
            .with_named_transform("rot13", &TransformRegistry::builtin())
            .unwrap_err();
        assert_eq!(err, SchemaError::UnknownTransform("rot13".to_string()));
    }

    #[test]
    fn schema_then_vector_matches_scenario() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("a"),
            FieldDescriptor::new("b").with_default(5.0),
        ])
        .unwrap();

        let cleaned = schema
            .validate(&input(&[("a", "1")]))
            .into_result()
            .unwrap();

        assert_eq!(to_vector(&cleaned).unwrap(), vec![1.0, 5.0]);
    }
}
