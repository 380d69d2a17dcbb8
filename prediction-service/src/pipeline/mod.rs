//! Prediction pipelines.
//!
//! A pipeline is loaded once at startup and shared read-only across
//! requests. It maps a fixed-length feature vector to a point prediction
//! and, for classifiers, to a probability distribution over classes.

pub mod linear;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub use linear::{Estimator, LinearPipeline, StandardScaler};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Inconsistent artifact: {0}")]
    Inconsistent(String),

    #[error("Expected {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Pipeline does not support {0}")]
    Unsupported(&'static str),

    #[error("Prediction is not finite")]
    NonFinite,
}

/// Which of the pipeline's operations to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictMethod {
    Point,
    Probabilities,
}

impl PredictMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictMethod::Point => "predict",
            PredictMethod::Probabilities => "predict_proba",
        }
    }
}

/// Result of a prediction call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(f64),
    Label(String),
    Distribution(Vec<f64>),
}

impl Outcome {
    /// Plain-text response body.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Value(v) => write!(f, "{}", v),
            Outcome::Label(label) => f.write_str(label),
            Outcome::Distribution(probs) => {
                for (i, p) in probs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", p)?;
                }
                Ok(())
            }
        }
    }
}

/// A trained model usable for inference.
pub trait Pipeline: Send + Sync {
    /// Length of the input vector.
    fn n_features(&self) -> usize;

    fn predict(&self, x: &[f64]) -> Result<Outcome, PipelineError>;

    fn supports_proba(&self) -> bool {
        false
    }

    fn predict_proba(&self, _x: &[f64]) -> Result<Vec<f64>, PipelineError> {
        Err(PipelineError::Unsupported("predict_proba"))
    }

    /// Dispatch on `method`.
    fn run(&self, x: &[f64], method: PredictMethod) -> Result<Outcome, PipelineError> {
        match method {
            PredictMethod::Point => self.predict(x),
            PredictMethod::Probabilities => self.predict_proba(x).map(Outcome::Distribution),
        }
    }
}

/// Load a pipeline artifact from disk.
pub fn load_pipeline(path: &Path) -> Result<Arc<dyn Pipeline>, PipelineError> {
    let raw = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let pipeline = LinearPipeline::from_json(&raw)?;
    Ok(Arc::new(pipeline))
}
