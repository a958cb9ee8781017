use axum::{Json, extract::State};
use zoo_core::ModelDescriptor;

use crate::state::AppState;

/// Model catalog, in configuration order
pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelDescriptor>> {
    Json(state.models.to_vec())
}
