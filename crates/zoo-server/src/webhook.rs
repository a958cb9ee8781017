//! Replicate webhook receiver
//!
//! Replicate posts the prediction object on start and on completion. The
//! query string carries the provenance attached when the job was created.

use axum::{
    Json,
    extract::{Query, State},
};
use http::StatusCode;
use zoo_providers::{CallbackProvenance, ReplicatePrediction, prediction_from_callback};

use crate::{error::Result, state::AppState};

pub async fn replicate_webhook(
    State(state): State<AppState>,
    Query(provenance): Query<CallbackProvenance>,
    Json(payload): Json<ReplicatePrediction>,
) -> Result<StatusCode> {
    let prediction = prediction_from_callback(payload, provenance)?;

    let outcome = state.orchestrator.store().upsert(&prediction).await?;

    tracing::info!(
        id = %prediction.id,
        submission_id = %prediction.submission_id,
        status = %prediction.status,
        ?outcome,
        "replicate webhook received"
    );

    Ok(StatusCode::OK)
}
