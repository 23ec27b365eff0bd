//! One party's ledger on one floor.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;

use super::requests::{parse_floor, DateFilter};
use crate::{
    models::PartyId,
    services::{ledger_view, session::LedgerSessionSnapshot},
    AppState,
};

/// Open or reload a party ledger for a window.
///
/// Also builds the floor's payment index the first time the floor is used.
/// If a newer window is requested while this fetch is in flight, this
/// response is dropped and the snapshot shows the newer load.
pub async fn party_ledger(
    State(state): State<AppState>,
    Path((floor, party_id)): Path<(String, PartyId)>,
    Query(filter): Query<DateFilter>,
) -> Result<Json<LedgerSessionSnapshot>, AppError> {
    let floor = parse_floor(&floor)?;
    let range = filter.into_range()?;

    let session = state.sessions.open(floor, party_id);
    let ticket = session.lock().await.view.begin_load(range);

    tracing::info!(
        floor = %floor,
        party_id,
        generation = ticket.generation,
        start_date = %range.start_date(),
        end_date = %range.end_date(),
        "Loading party ledger"
    );

    let (result, _index) = tokio::join!(
        ledger_view::fetch(state.backend.as_ref(), ticket),
        state.indexes.ensure_loaded(floor)
    );

    let mut session = session.lock().await;
    session.view.complete(ticket, result);
    Ok(Json(session.snapshot()))
}

/// Close a party ledger and its payment flow.
///
/// A load still in flight for the closed ledger completes into the dropped
/// session; a ledger opened afterwards starts fresh.
pub async fn close_party_ledger(
    State(state): State<AppState>,
    Path((floor, party_id)): Path<(String, PartyId)>,
) -> Result<StatusCode, AppError> {
    let floor = parse_floor(&floor)?;

    if !state.sessions.close(floor, party_id) {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "No open ledger for party {}",
            party_id
        )));
    }

    tracing::info!(floor = %floor, party_id, open_sessions = state.sessions.len(), "Closed party ledger");
    Ok(StatusCode::NO_CONTENT)
}

/// Relay the ledger PDF exactly as rendered upstream.
pub async fn party_ledger_pdf(
    State(state): State<AppState>,
    Path((floor, party_id)): Path<(String, PartyId)>,
    Query(filter): Query<DateFilter>,
) -> Result<Response, AppError> {
    let floor = parse_floor(&floor)?;
    let range = filter.into_range()?;

    let bytes = state
        .backend
        .get_party_ledger_pdf(party_id, range)
        .await
        .map_err(|e| {
            tracing::error!(floor = %floor, party_id, error = %e, "Ledger PDF download failed");
            AppError::from(e)
        })?;

    let filename = format!(
        "ledger-{}-{}-{}.pdf",
        party_id,
        range.start_date(),
        range.end_date()
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}
