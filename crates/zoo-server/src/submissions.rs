//! Multi-model submissions

use axum::{
    Json,
    extract::{Path, State},
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use zoo_core::{Prediction, models_of, prompt_of};
use zoo_orchestrator::SubmitRequest;

use crate::{
    error::{ApiError, Result},
    state::AppState,
};

/// Upper bound on outputs per model in one submission
const MAX_OUTPUTS_PER_MODEL: u32 = 8;

#[derive(Debug, Deserialize)]
pub struct CreateSubmission {
    pub prompt: String,
    /// Catalog model names; the catalog's checked models when absent
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default = "default_outputs")]
    pub outputs_per_model: u32,
    #[serde(default)]
    pub anon_id: Option<String>,
}

const fn default_outputs() -> u32 {
    1
}

#[derive(Debug, Serialize)]
pub struct SubmissionCreated {
    pub submission_id: String,
}

#[derive(Debug, Serialize)]
pub struct StoredSubmission {
    pub submission_id: String,
    pub prompt: String,
    pub models: Vec<String>,
    pub predictions: Vec<Prediction>,
}

/// Start a submission and answer before any provider responds
pub async fn create_submission(
    State(state): State<AppState>,
    Json(body): Json<CreateSubmission>,
) -> Result<(StatusCode, Json<SubmissionCreated>)> {
    if body.prompt.trim().is_empty() {
        return Err(ApiError::InvalidRequest("prompt must not be empty".to_owned()));
    }

    if !(1..=MAX_OUTPUTS_PER_MODEL).contains(&body.outputs_per_model) {
        return Err(ApiError::InvalidRequest(format!(
            "outputs_per_model must be between 1 and {MAX_OUTPUTS_PER_MODEL}"
        )));
    }

    let models = match &body.models {
        Some(names) => names
            .iter()
            .map(|name| state.model(name).cloned())
            .collect::<Result<Vec<_>>>()?,
        None => state.models.iter().filter(|m| m.checked).cloned().collect(),
    };

    if models.is_empty() {
        return Err(ApiError::InvalidRequest("no models selected".to_owned()));
    }

    let handle = state.orchestrator.submit(SubmitRequest {
        prompt: body.prompt,
        models,
        outputs_per_model: body.outputs_per_model,
        anon_id: body.anon_id,
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmissionCreated {
            submission_id: handle.submission_id().to_owned(),
        }),
    ))
}

/// Everything stored for a submission
pub async fn get_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> Result<Json<StoredSubmission>> {
    let view = state.orchestrator.open(&submission_id).await?;
    let predictions: Vec<Prediction> = view.predictions().cloned().collect();

    if predictions.is_empty() {
        return Err(ApiError::NotFound(format!("submission {submission_id} not found")));
    }

    Ok(Json(StoredSubmission {
        prompt: prompt_of(&predictions).to_owned(),
        models: models_of(&predictions).into_iter().map(str::to_owned).collect(),
        submission_id,
        predictions,
    }))
}
