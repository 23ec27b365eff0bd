//! Payment index status and the record-payment flow.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use service_core::error::AppError;
use validator::Validate;

use super::requests::{parse_floor, RecordPaymentForm};
use crate::{
    models::PartyId,
    services::{
        payment_index::IndexSummary,
        reconciliation::{PaymentSubmission, Settlement},
        session::{self, LedgerSessionSnapshot},
    },
    AppState,
};

pub async fn index_status(
    State(state): State<AppState>,
    Path(floor): Path<String>,
) -> Result<Json<IndexSummary>, AppError> {
    let floor = parse_floor(&floor)?;
    Ok(Json(state.indexes.snapshot(floor).await.summary()))
}

pub async fn rebuild_index(
    State(state): State<AppState>,
    Path(floor): Path<String>,
) -> Result<Json<IndexSummary>, AppError> {
    let floor = parse_floor(&floor)?;
    tracing::info!(floor = %floor, "Payment index rebuild requested");
    Ok(Json(state.indexes.rebuild(floor).await.summary()))
}

/// Resolve the payment record for a due and open the capture form.
///
/// Resolution reads the floor's current index and never triggers a build,
/// so a request made before the floor has loaded reports "still loading".
pub async fn request_payment(
    State(state): State<AppState>,
    Path((floor, party_id)): Path<(String, PartyId)>,
    Json(form): Json<RecordPaymentForm>,
) -> Result<Json<LedgerSessionSnapshot>, AppError> {
    form.validate()?;
    let floor = parse_floor(&floor)?;

    // Lock first so a submission still settling on this session has
    // published its rebuilt index before the snapshot is read.
    let session = state.sessions.open(floor, party_id);
    let mut session = session.lock().await;
    let index = state.indexes.snapshot(floor).await;

    session.flow.request_payment(&index, form.order_id, form.mode);
    Ok(Json(session.snapshot()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub settlement: Settlement,
    pub session: LedgerSessionSnapshot,
}

/// Submit the receipt entered in the open form.
///
/// The submission runs detached from this request, so a client that
/// disconnects mid-way does not leave the index or the ledger stale.
pub async fn submit_payment(
    State(state): State<AppState>,
    Path((floor, party_id)): Path<(String, PartyId)>,
    Json(submission): Json<PaymentSubmission>,
) -> Result<Json<SubmitResponse>, AppError> {
    let floor = parse_floor(&floor)?;

    let ledger_session = state
        .sessions
        .get(floor, party_id)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No open ledger for party {}", party_id)))?;

    let (settlement, session) = session::submit_payment(
        ledger_session,
        state.backend.clone(),
        state.indexes.clone(),
        submission,
    )
    .await?;

    Ok(Json(SubmitResponse {
        settlement,
        session,
    }))
}

/// Close the flow's message or open form.
pub async fn dismiss(
    State(state): State<AppState>,
    Path((floor, party_id)): Path<(String, PartyId)>,
) -> Result<Json<LedgerSessionSnapshot>, AppError> {
    let floor = parse_floor(&floor)?;

    let session = state.sessions.open(floor, party_id);
    let mut session = session.lock().await;
    session.flow.dismiss();
    session.view.dismiss_error();
    Ok(Json(session.snapshot()))
}
