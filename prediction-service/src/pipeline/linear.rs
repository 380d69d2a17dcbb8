//! Linear pipelines: an optional standard scaler followed by a linear
//! regressor or a softmax classifier, deserialised from JSON.
//!
//! ```json
//! {
//!   "scaler": { "mean": [0.0, 0.0], "scale": [1.0, 1.0] },
//!   "estimator": {
//!     "kind": "softmax_classifier",
//!     "classes": ["0", "1"],
//!     "coefficients": [[1.0, 0.0], [0.0, 1.0]],
//!     "intercepts": [0.0, 0.0]
//!   }
//! }
//! ```

use super::{Outcome, Pipeline, PipelineError};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    fn transform(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (mean, scale))| {
                // Constant features were fitted with zero variance.
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (v - mean) / scale
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    LinearRegression {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    SoftmaxClassifier {
        classes: Vec<String>,
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    },
}

impl Estimator {
    fn n_features(&self) -> usize {
        match self {
            Estimator::LinearRegression { coefficients, .. } => coefficients.len(),
            Estimator::SoftmaxClassifier { coefficients, .. } => {
                coefficients.first().map_or(0, Vec::len)
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearPipeline {
    #[serde(default)]
    scaler: Option<StandardScaler>,
    estimator: Estimator,
}

impl LinearPipeline {
    pub fn new(scaler: Option<StandardScaler>, estimator: Estimator) -> Result<Self, PipelineError> {
        let pipeline = Self { scaler, estimator };
        pipeline.check()?;
        Ok(pipeline)
    }

    pub fn from_json(raw: &str) -> Result<Self, PipelineError> {
        let pipeline: Self = serde_json::from_str(raw)?;
        pipeline.check()?;
        Ok(pipeline)
    }

    fn check(&self) -> Result<(), PipelineError> {
        let n = self.estimator.n_features();
        if n == 0 {
            return Err(PipelineError::Inconsistent("estimator has no features".into()));
        }

        if let Some(scaler) = &self.scaler {
            if scaler.mean.len() != n || scaler.scale.len() != n {
                return Err(PipelineError::Inconsistent(format!(
                    "scaler has {} means and {} scales for {} features",
                    scaler.mean.len(),
                    scaler.scale.len(),
                    n
                )));
            }
        }

        if let Estimator::SoftmaxClassifier {
            classes,
            coefficients,
            intercepts,
        } = &self.estimator
        {
            if classes.len() < 2 {
                return Err(PipelineError::Inconsistent(
                    "classifier needs at least two classes".into(),
                ));
            }
            if coefficients.len() != classes.len() || intercepts.len() != classes.len() {
                return Err(PipelineError::Inconsistent(format!(
                    "{} classes, {} coefficient rows, {} intercepts",
                    classes.len(),
                    coefficients.len(),
                    intercepts.len()
                )));
            }
            if coefficients.iter().any(|row| row.len() != n) {
                return Err(PipelineError::Inconsistent(
                    "coefficient rows differ in length".into(),
                ));
            }
        }

        Ok(())
    }

    fn prepare(&self, x: &[f64]) -> Result<Vec<f64>, PipelineError> {
        let expected = self.n_features();
        if x.len() != expected {
            return Err(PipelineError::DimensionMismatch {
                expected,
                got: x.len(),
            });
        }
        Ok(match &self.scaler {
            Some(scaler) => scaler.transform(x),
            None => x.to_vec(),
        })
    }

    /// Per-class scores for a classifier.
    fn decision_function(&self, x: &[f64]) -> Result<Vec<f64>, PipelineError> {
        let x = self.prepare(x)?;
        match &self.estimator {
            Estimator::SoftmaxClassifier {
                coefficients,
                intercepts,
                ..
            } => Ok(coefficients
                .iter()
                .zip(intercepts)
                .map(|(row, b)| dot(row, &x) + b)
                .collect()),
            Estimator::LinearRegression { .. } => {
                Err(PipelineError::Unsupported("decision_function"))
            }
        }
    }
}

impl Pipeline for LinearPipeline {
    fn n_features(&self) -> usize {
        self.estimator.n_features()
    }

    fn predict(&self, x: &[f64]) -> Result<Outcome, PipelineError> {
        match &self.estimator {
            Estimator::LinearRegression {
                coefficients,
                intercept,
            } => {
                let x = self.prepare(x)?;
                let value = dot(coefficients, &x) + intercept;
                if !value.is_finite() {
                    return Err(PipelineError::NonFinite);
                }
                Ok(Outcome::Value(value))
            }
            Estimator::SoftmaxClassifier { classes, .. } => {
                let scores = self.decision_function(x)?;
                let best = argmax(&scores).ok_or(PipelineError::NonFinite)?;
                Ok(Outcome::Label(classes[best].clone()))
            }
        }
    }

    fn supports_proba(&self) -> bool {
        matches!(self.estimator, Estimator::SoftmaxClassifier { .. })
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, PipelineError> {
        if !self.supports_proba() {
            return Err(PipelineError::Unsupported("predict_proba"));
        }
        let scores = self.decision_function(x)?;
        softmax(&scores).ok_or(PipelineError::NonFinite)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.iter().copied().enumerate() {
        if !v.is_finite() {
            return None;
        }
        // First index wins ties.
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

fn softmax(scores: &[f64]) -> Option<Vec<f64>> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return None;
    }
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    Some(exps.into_iter().map(|e| e / total).collect())
}
