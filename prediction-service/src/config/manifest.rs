//! Model manifest: the file declaring which models are served and how
//! their input is read.
//!
//! ```toml
//! [[models]]
//! name = "iris"
//! artifact = "iris.json"
//! input = "fields"
//! fields = [
//!     { name = "sepal_length" },
//!     { name = "petal_width", default = 0.2, transform = "float" },
//! ]
//! ```

use crate::pipeline::PipelineError;
use crate::schema::{FieldValue, SchemaError};
use config::{Config as Cfg, File};
use serde::Deserialize;
use serving_core::error::AppError;
use std::path::Path;
use thiserror::Error;
use validator::Validate;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to load manifest: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid manifest entry: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("Invalid model name '{0}': use letters, digits, '-' and '_'")]
    InvalidName(String),

    #[error("Model '{0}' is declared twice")]
    DuplicateModel(String),

    #[error("Model '{0}' uses fields input but declares no fields")]
    MissingFields(String),

    #[error("Model '{0}' uses values input and cannot declare fields")]
    UnexpectedFields(String),

    #[error("Model '{model}': {source}")]
    Schema { model: String, source: SchemaError },

    #[error("Model '{model}': {source}")]
    Pipeline {
        model: String,
        source: PipelineError,
    },

    #[error("Model '{model}' declares {fields} fields but its pipeline expects {features}")]
    FeatureCount {
        model: String,
        fields: usize,
        features: usize,
    },
}

impl From<ManifestError> for AppError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Invalid(errors) => AppError::ValidationError(errors),
            other => AppError::ConfigError(anyhow::Error::new(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Values,
    Fields,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FieldEntry {
    #[validate(length(min = 1, message = "Field name is required"))]
    pub name: String,
    #[serde(default)]
    pub default: Option<FieldValue>,
    #[serde(default)]
    pub transform: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ModelEntry {
    #[validate(length(min = 1, max = 64, message = "Model name must be 1-64 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "Artifact path is required"))]
    pub artifact: String,
    pub input: InputKind,
    #[serde(default)]
    pub fields: Vec<FieldEntry>,
    #[serde(default = "default_probabilities")]
    pub probabilities: bool,
}

fn default_probabilities() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

impl Manifest {
    /// Read a manifest file; the format follows the file extension.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let manifest: Manifest = Cfg::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        for entry in &self.models {
            entry.validate()?;
            for field in &entry.fields {
                field.validate()?;
            }
            // Names become URL path segments.
            if !entry
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(ManifestError::InvalidName(entry.name.clone()));
            }
        }
        Ok(())
    }
}
