//! All-party ledger board.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use service_core::error::AppError;

use super::requests::DateFilter;
use crate::{
    models::{DateRange, PartyId},
    services::ledger_aggregator::LedgerBoardSnapshot,
    AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStarted {
    pub generation: u64,
    pub parties: usize,
    pub range: DateRange,
}

/// Start loading every party's ledger for the window. Rows fill in as the
/// fetches resolve; poll the board to follow them.
pub async fn load_ledgers(
    State(state): State<AppState>,
    Json(filter): Json<DateFilter>,
) -> Result<(StatusCode, Json<LoadStarted>), AppError> {
    let range = filter.into_range()?;

    let parties = state.backend.get_all_parties().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to load parties for dashboard");
        AppError::from(e)
    })?;
    let count = parties.len();

    let handle = state.aggregator.load_all(parties, range).await;

    tracing::info!(
        generation = handle.generation(),
        parties = count,
        start_date = %range.start_date(),
        end_date = %range.end_date(),
        "Dashboard ledger load started"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(LoadStarted {
            generation: handle.generation(),
            parties: count,
            range,
        }),
    ))
}

pub async fn ledger_board(State(state): State<AppState>) -> Json<LedgerBoardSnapshot> {
    Json(state.aggregator.snapshot().await)
}

pub async fn retry_party(
    State(state): State<AppState>,
    Path(party_id): Path<PartyId>,
) -> Result<StatusCode, AppError> {
    match state.aggregator.reload_party(party_id).await {
        Some(_) => Ok(StatusCode::ACCEPTED),
        None => Err(AppError::NotFound(anyhow::anyhow!(
            "Party {} is not on the dashboard",
            party_id
        ))),
    }
}
