use crate::models::{InputLayout, LayoutKind, VALUES_FIELD};
use crate::pipeline::PredictMethod;
use crate::startup::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub input: LayoutKind,
    /// Form keys the model reads, in vector order.
    pub fields: Vec<String>,
    pub n_features: usize,
    pub probabilities: bool,
}

/// Describe every served model.
pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelSummary>> {
    let summaries = state
        .registry
        .iter()
        .map(|model| ModelSummary {
            name: model.name().to_string(),
            input: model.layout().kind(),
            fields: match model.layout() {
                InputLayout::Values => vec![VALUES_FIELD.to_string()],
                InputLayout::Fields(schema) => schema.names().map(str::to_string).collect(),
            },
            n_features: model.n_features(),
            probabilities: model.supports(PredictMethod::Probabilities),
        })
        .collect();

    Json(summaries)
}
