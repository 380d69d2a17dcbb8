use super::{InputLayout, Model};
use crate::config::manifest::{InputKind, Manifest, ManifestError, ModelEntry};
use crate::pipeline::load_pipeline;
use crate::schema::{FieldDescriptor, Schema, TransformRegistry};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Models by name. Built once at startup and read-only afterwards.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<Model>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: Model) -> Result<(), ManifestError> {
        let name = model.name().to_string();
        if self.models.contains_key(&name) {
            return Err(ManifestError::DuplicateModel(name));
        }
        self.models.insert(name, Arc::new(model));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Build every model declared in `manifest`. Artifact paths are resolved
    /// against `base_dir`.
    pub fn from_manifest(
        manifest: &Manifest,
        base_dir: &Path,
        transforms: &TransformRegistry,
    ) -> Result<Self, ManifestError> {
        let mut registry = Self::new();
        for entry in &manifest.models {
            let model = build_model(entry, base_dir, transforms)?;
            tracing::info!(
                model = %model.name(),
                n_features = model.n_features(),
                probabilities = model.supports(crate::pipeline::PredictMethod::Probabilities),
                "Loaded model"
            );
            registry.insert(model)?;
        }
        Ok(registry)
    }
}

fn build_model(
    entry: &ModelEntry,
    base_dir: &Path,
    transforms: &TransformRegistry,
) -> Result<Model, ManifestError> {
    let layout = match entry.input {
        InputKind::Values => {
            if !entry.fields.is_empty() {
                return Err(ManifestError::UnexpectedFields(entry.name.clone()));
            }
            InputLayout::Values
        }
        InputKind::Fields => {
            if entry.fields.is_empty() {
                return Err(ManifestError::MissingFields(entry.name.clone()));
            }
            let schema = build_schema(entry, transforms)?;
            InputLayout::Fields(schema)
        }
    };

    let artifact = base_dir.join(&entry.artifact);
    let pipeline = load_pipeline(&artifact).map_err(|source| ManifestError::Pipeline {
        model: entry.name.clone(),
        source,
    })?;

    if let InputLayout::Fields(schema) = &layout {
        if schema.len() != pipeline.n_features() {
            return Err(ManifestError::FeatureCount {
                model: entry.name.clone(),
                fields: schema.len(),
                features: pipeline.n_features(),
            });
        }
    }

    let mut model = Model::new(entry.name.clone(), layout, pipeline);
    if entry.probabilities && !model.supports(crate::pipeline::PredictMethod::Probabilities) {
        tracing::warn!(
            model = %entry.name,
            "Pipeline cannot produce probabilities; predict_proba disabled"
        );
    }
    if !entry.probabilities {
        model = model.without_probabilities();
    }
    Ok(model)
}

fn build_schema(entry: &ModelEntry, transforms: &TransformRegistry) -> Result<Schema, ManifestError> {
    let schema_err = |source| ManifestError::Schema {
        model: entry.name.clone(),
        source,
    };

    let fields = entry
        .fields
        .iter()
        .map(|field| {
            let mut descriptor = FieldDescriptor::new(field.name.clone());
            if let Some(default) = &field.default {
                descriptor = descriptor.with_default(default.clone());
            }
            if let Some(name) = &field.transform {
                descriptor = descriptor
                    .with_named_transform(name, transforms)
                    .map_err(schema_err)?;
            }
            Ok(descriptor)
        })
        .collect::<Result<Vec<_>, ManifestError>>()?;

    Schema::new(fields).map_err(schema_err)
}
