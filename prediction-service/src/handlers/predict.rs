use crate::models::ModelRegistry;
use crate::pipeline::PredictMethod;
use crate::schema::RawInput;
use crate::startup::AppState;
use axum::extract::{rejection::FormRejection, Form, Path, State};
use metrics::counter;
use serving_core::error::AppError;

/// `POST /{model}/predict/`: point prediction as plain text.
pub async fn predict(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    form: Result<Form<RawInput>, FormRejection>,
) -> Result<String, AppError> {
    let Form(input) = form.map_err(form_error)?;
    handle(&state.registry, &model_id, &input, PredictMethod::Point)
}

/// `POST /{model}/predict_proba/`: comma-separated class probabilities.
pub async fn predict_proba(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    form: Result<Form<RawInput>, FormRejection>,
) -> Result<String, AppError> {
    let Form(input) = form.map_err(form_error)?;
    handle(
        &state.registry,
        &model_id,
        &input,
        PredictMethod::Probabilities,
    )
}

fn form_error(rejection: FormRejection) -> AppError {
    AppError::BadRequest(anyhow::anyhow!("Invalid form body: {}", rejection.body_text()))
}

/// Validate `input` for `model_id`, run the pipeline and format the result.
#[tracing::instrument(skip(registry, input, method), fields(method = method.as_str()))]
pub fn handle(
    registry: &ModelRegistry,
    model_id: &str,
    input: &RawInput,
    method: PredictMethod,
) -> Result<String, AppError> {
    let model = registry
        .get(model_id)
        .filter(|model| model.supports(method))
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "No {} endpoint for model '{}'",
                method.as_str(),
                model_id
            ))
        })?;

    let x = model.parse_input(input).map_err(|err| {
        tracing::warn!(error = %err, "Rejected prediction input");
        record(model_id, method, "invalid_input");
        AppError::from(err)
    })?;

    let outcome = model.predict(&x, method).map_err(|err| {
        tracing::error!(error = %err, "Pipeline failed");
        record(model_id, method, "error");
        AppError::InternalError(anyhow::Error::new(err))
    })?;

    record(model_id, method, "ok");
    Ok(outcome.to_text())
}

fn record(model_id: &str, method: PredictMethod, outcome: &'static str) {
    counter!(
        "predictions_total",
        "model" => model_id.to_string(),
        "method" => method.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}
