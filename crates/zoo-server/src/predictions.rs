//! Single-prediction endpoints

use axum::{
    Json,
    extract::{Path, State},
};
use http::StatusCode;
use serde::Deserialize;
use zoo_core::{GenerationRequest, Prediction};

use crate::{
    error::{ApiError, Result},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreatePrediction {
    pub prompt: String,
    /// Catalog model name
    pub model: String,
    pub submission_id: String,
    #[serde(default)]
    pub output_index: u32,
    #[serde(default)]
    pub anon_id: Option<String>,
}

/// Create one prediction for one model
///
/// Synchronous providers answer with the finished prediction. Replicate
/// answers with the started job; its webhook reports completion.
pub async fn create_prediction(
    State(state): State<AppState>,
    Json(body): Json<CreatePrediction>,
) -> Result<(StatusCode, Json<Prediction>)> {
    if body.prompt.trim().is_empty() {
        return Err(ApiError::InvalidRequest("prompt must not be empty".to_owned()));
    }

    let request = GenerationRequest {
        model: state.model(&body.model)?.clone(),
        prompt: body.prompt,
        submission_id: body.submission_id,
        output_index: body.output_index,
        anon_id: body.anon_id,
    };

    tracing::debug!(model = %request.model.name, source = %request.model.source, "creating prediction");

    let prediction = state.orchestrator.create_prediction(&request).await?;

    Ok((StatusCode::CREATED, Json(prediction)))
}

/// Current state of a prediction
pub async fn get_prediction(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Prediction>> {
    state
        .orchestrator
        .refresh(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("prediction {id} not found")))
}
