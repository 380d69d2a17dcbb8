//! Served models: how each one reads its input and which pipeline it feeds.

pub mod registry;

use crate::pipeline::{Outcome, Pipeline, PipelineError, PredictMethod};
use crate::schema::{to_vector, FieldError, FieldErrors, FieldValue, NonNumeric, RawInput, Schema};
use serde::Serialize;
use serving_core::error::AppError;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

pub use registry::ModelRegistry;

/// Form key carrying comma-separated variables for [`InputLayout::Values`].
pub const VALUES_FIELD: &str = "values";

/// How a model reads its raw input.
#[derive(Debug, Clone)]
pub enum InputLayout {
    /// One `values` field of comma-separated variables.
    Values,
    /// Named fields checked against a schema.
    Fields(Schema),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    Values,
    Fields,
}

impl InputLayout {
    pub fn kind(&self) -> LayoutKind {
        match self {
            InputLayout::Values => LayoutKind::Values,
            InputLayout::Fields(_) => LayoutKind::Fields,
        }
    }

    /// Name of the field at `position`, if this layout names its fields.
    pub fn field_name(&self, position: usize) -> Option<&str> {
        match self {
            InputLayout::Values => None,
            InputLayout::Fields(schema) => schema.fields().get(position).map(|f| f.name()),
        }
    }

    /// Extract the ordered raw values from `input`.
    pub fn extract(&self, input: &RawInput) -> Result<Vec<FieldValue>, InputError> {
        match self {
            InputLayout::Values => {
                let values = input.get(VALUES_FIELD).ok_or(InputError::MissingValues)?;
                Ok(values
                    .split(',')
                    .map(|v| FieldValue::Text(v.trim().to_string()))
                    .collect())
            }
            InputLayout::Fields(schema) => schema
                .validate(input)
                .into_result()
                .map_err(InputError::Fields),
        }
    }
}

/// Client-side input problems. All map to a 400 response.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("\"values\" variable not present in input")]
    MissingValues,

    #[error("{count} field(s) failed validation ({0})", count = .0.len())]
    Fields(FieldErrors),

    /// `field` names the offending field when the layout has names.
    #[error("{source}")]
    NonNumeric {
        source: NonNumeric,
        field: Option<String>,
    },

    #[error("expected {expected} values, got {got}")]
    Arity { expected: usize, got: usize },
}

impl InputError {
    /// Field name to message, for the response body.
    pub fn field_messages(&self) -> BTreeMap<String, String> {
        match self {
            InputError::MissingValues => {
                let mut fields = BTreeMap::new();
                fields.insert(
                    VALUES_FIELD.to_string(),
                    FieldError::Missing.to_string(),
                );
                fields
            }
            InputError::Fields(errors) => errors.messages(),
            InputError::NonNumeric {
                source,
                field: Some(field),
            } => {
                let mut fields = BTreeMap::new();
                fields.insert(field.clone(), source.to_string());
                fields
            }
            InputError::NonNumeric { field: None, .. } | InputError::Arity { .. } => {
                BTreeMap::new()
            }
        }
    }
}

impl From<InputError> for AppError {
    fn from(err: InputError) -> Self {
        AppError::InvalidInput {
            fields: err.field_messages(),
            message: err.to_string(),
        }
    }
}

/// A named model served over HTTP.
pub struct Model {
    name: String,
    layout: InputLayout,
    pipeline: Arc<dyn Pipeline>,
    probabilities: bool,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("layout", &self.layout)
            .field("n_features", &self.pipeline.n_features())
            .field("probabilities", &self.probabilities)
            .finish()
    }
}

impl Model {
    /// Probability output is offered only when the pipeline supports it.
    pub fn new(name: impl Into<String>, layout: InputLayout, pipeline: Arc<dyn Pipeline>) -> Self {
        let probabilities = pipeline.supports_proba();
        Self {
            name: name.into(),
            layout,
            pipeline,
            probabilities,
        }
    }

    /// Turn probability output off even if the pipeline supports it.
    pub fn without_probabilities(mut self) -> Self {
        self.probabilities = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &InputLayout {
        &self.layout
    }

    pub fn n_features(&self) -> usize {
        self.pipeline.n_features()
    }

    pub fn supports(&self, method: PredictMethod) -> bool {
        match method {
            PredictMethod::Point => true,
            PredictMethod::Probabilities => self.probabilities,
        }
    }

    /// Raw form input to the numeric vector fed to the pipeline.
    pub fn parse_input(&self, input: &RawInput) -> Result<Vec<f64>, InputError> {
        let values = self.layout.extract(input)?;
        let vector = to_vector(&values).map_err(|source| InputError::NonNumeric {
            field: self.layout.field_name(source.position).map(str::to_string),
            source,
        })?;

        let expected = self.n_features();
        if vector.len() != expected {
            return Err(InputError::Arity {
                expected,
                got: vector.len(),
            });
        }
        Ok(vector)
    }

    pub fn predict(&self, x: &[f64], method: PredictMethod) -> Result<Outcome, PipelineError> {
        if !self.supports(method) {
            return Err(PipelineError::Unsupported(method.as_str()));
        }
        self.pipeline.run(x, method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Estimator, LinearPipeline};
    use crate::schema::FieldDescriptor;

    fn input(pairs: &[(&str, &str)]) -> RawInput {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sum_pipeline(n: usize) -> Arc<dyn Pipeline> {
        Arc::new(
            LinearPipeline::new(
                None,
                Estimator::LinearRegression {
                    coefficients: vec![1.0; n],
                    intercept: 0.0,
                },
            )
            .unwrap(),
        )
    }

    fn fields_model() -> Model {
        let schema =
            Schema::new(vec![FieldDescriptor::new("a"), FieldDescriptor::new("b")]).unwrap();
        Model::new("kv", InputLayout::Fields(schema), sum_pipeline(2))
    }

    #[test]
    fn values_layout_splits_and_strips() {
        let values = InputLayout::Values
            .extract(&input(&[("values", "1, 2")]))
            .unwrap();
        assert_eq!(values, vec![FieldValue::from("1"), FieldValue::from("2")]);
    }

    #[test]
    fn values_layout_requires_values_field() {
        let err = InputLayout::Values.extract(&RawInput::new()).unwrap_err();
        assert!(matches!(err, InputError::MissingValues));
        assert!(err.field_messages().contains_key("values"));
    }

    #[test]
    fn fields_layout_reads_schema_order() {
        let values = fields_model()
            .layout()
            .extract(&input(&[("b", "2"), ("a", "1")]))
            .unwrap();
        assert_eq!(values, vec![FieldValue::from("1"), FieldValue::from("2")]);
    }

    #[test]
    fn fields_layout_reports_missing_field() {
        let err = fields_model()
            .parse_input(&input(&[("a", "1")]))
            .unwrap_err();
        assert_eq!(
            err.field_messages().get("b").map(String::as_str),
            Some("missing and no default")
        );
        assert_eq!(
            err.to_string(),
            "1 field(s) failed validation (b: missing and no default)"
        );
    }

    #[test]
    fn parse_input_rejects_non_numeric() {
        let err = fields_model()
            .parse_input(&input(&[("a", "1"), ("b", "3b")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "could not convert string to float: '3b'");
        assert_eq!(
            err.field_messages().get("b").map(String::as_str),
            Some("could not convert string to float: '3b'")
        );
    }

    #[test]
    fn values_layout_non_numeric_has_no_field_name() {
        let model = Model::new("values", InputLayout::Values, sum_pipeline(2));
        let err = model
            .parse_input(&input(&[("values", "1,nan")]))
            .unwrap_err();
        assert!(matches!(err, InputError::NonNumeric { field: None, .. }));
        assert!(err.field_messages().is_empty());
    }

    #[test]
    fn parse_input_checks_arity() {
        let model = Model::new("values", InputLayout::Values, sum_pipeline(3));
        let err = model
            .parse_input(&input(&[("values", "1,2")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "expected 3 values, got 2");
    }

    #[test]
    fn regressor_model_offers_no_probabilities() {
        let model = fields_model();
        assert!(model.supports(PredictMethod::Point));
        assert!(!model.supports(PredictMethod::Probabilities));
        assert!(matches!(
            model.predict(&[1.0, 2.0], PredictMethod::Probabilities),
            Err(PipelineError::Unsupported("predict_proba"))
        ));
    }

    #[test]
    fn predict_runs_pipeline() {
        let model = fields_model();
        let x = model.parse_input(&input(&[("a", "1"), ("b", "2")])).unwrap();
        assert_eq!(
            model.predict(&x, PredictMethod::Point).unwrap(),
            Outcome::Value(3.0)
        );
    }

    #[test]
    fn input_error_converts_to_invalid_input() {
        let app_err: AppError = InputError::MissingValues.into();
        match app_err {
            AppError::InvalidInput { message, fields } => {
                assert_eq!(message, "\"values\" variable not present in input");
                assert!(fields.contains_key("values"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
