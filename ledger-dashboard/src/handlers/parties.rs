use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{models::Party, AppState};

pub async fn list_parties(State(state): State<AppState>) -> Result<Json<Vec<Party>>, AppError> {
    let parties = state.backend.get_all_parties().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to load parties");
        AppError::from(e)
    })?;

    tracing::debug!(count = parties.len(), "Parties loaded");
    Ok(Json(parties))
}
