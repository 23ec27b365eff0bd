//! Dashboard-wide ledger totals across many parties.
//!
//! Each party's ledger is fetched by its own task and written into that
//! party's row only. A failed fetch marks its row and nothing else. Every
//! load stamps its rows with a fresh ticket; a result whose ticket no longer
//! matches the row (the date filter changed, or the row was reloaded) is
//! dropped on arrival.

use crate::models::{DateRange, Party, PartyId, PartyLedgerResponse};
use crate::services::backend::{BackendError, LedgerBackend};
use crate::services::metrics;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::Instrument;

#[derive(Debug, Clone)]
enum RowState {
    Loading,
    Loaded(PartyLedgerResponse),
    Failed(String),
}

/// A party with its ledger load state. Loading, loaded and failed are
/// mutually exclusive.
#[derive(Debug, Clone)]
pub struct PartyLedgerRow {
    pub party: Party,
    state: RowState,
    ticket: u64,
}

impl PartyLedgerRow {
    pub fn ledger(&self) -> Option<&PartyLedgerResponse> {
        match &self.state {
            RowState::Loaded(ledger) => Some(ledger),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, RowState::Loading)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.state, RowState::Failed(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            RowState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

impl Serialize for PartyLedgerRow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Row<'a> {
            party: &'a Party,
            ledger: Option<&'a PartyLedgerResponse>,
            loading: bool,
            error: bool,
            error_message: Option<&'a str>,
        }

        Row {
            party: &self.party,
            ledger: self.ledger(),
            loading: self.is_loading(),
            error: self.is_error(),
            error_message: self.error_message(),
        }
        .serialize(serializer)
    }
}

/// Sums over rows that have a ledger. Pending and failed rows add nothing,
/// so while `provisional` is set the totals are a lower bound.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTotals {
    pub total_official_amount: Decimal,
    pub total_offline_amount: Decimal,
    pub total_received_amount: Decimal,
    pub total_remaining_amount: Decimal,
    pub loaded: usize,
    pub pending: usize,
    pub failed: usize,
    pub provisional: bool,
}

impl LedgerTotals {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a PartyLedgerRow>) -> Self {
        let mut totals = LedgerTotals::default();

        for row in rows {
            match &row.state {
                RowState::Loaded(ledger) => {
                    totals.total_official_amount += ledger.total_official_amount;
                    totals.total_offline_amount += ledger.total_offline_amount;
                    totals.total_received_amount += ledger.total_received_amount;
                    totals.total_remaining_amount += ledger.total_remaining_amount;
                    totals.loaded += 1;
                }
                RowState::Loading => totals.pending += 1,
                RowState::Failed(_) => totals.failed += 1,
            }
        }

        totals.provisional = totals.pending > 0;
        totals
    }
}

#[derive(Debug, Default)]
struct LedgerBoard {
    generation: u64,
    next_ticket: u64,
    range: Option<DateRange>,
    rows: Vec<PartyLedgerRow>,
}

impl LedgerBoard {
    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Replace all rows with loading rows for a new filter.
    fn begin(&mut self, parties: Vec<Party>, range: DateRange) -> Vec<(PartyId, u64)> {
        self.generation += 1;
        self.range = Some(range);

        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(parties.len());
        for party in parties {
            if !seen.insert(party.id) {
                continue;
            }
            let ticket = self.issue_ticket();
            rows.push(PartyLedgerRow {
                party,
                state: RowState::Loading,
                ticket,
            });
        }
        self.rows = rows;

        self.rows.iter().map(|row| (row.party.id, row.ticket)).collect()
    }

    fn restart_row(&mut self, party_id: PartyId) -> Option<u64> {
        let ticket = self.next_ticket + 1;
        let row = self.rows.iter_mut().find(|row| row.party.id == party_id)?;
        row.state = RowState::Loading;
        row.ticket = ticket;
        self.next_ticket = ticket;
        Some(ticket)
    }

    /// Apply a fetch result. Returns false when the result is stale.
    fn apply(
        &mut self,
        party_id: PartyId,
        ticket: u64,
        result: Result<PartyLedgerResponse, BackendError>,
    ) -> bool {
        let Some(row) = self
            .rows
            .iter_mut()
            .find(|row| row.party.id == party_id && row.ticket == ticket)
        else {
            return false;
        };

        row.state = match result {
            Ok(ledger) => RowState::Loaded(ledger),
            Err(e) => RowState::Failed(e.user_message()),
        };
        true
    }
}

/// Point-in-time copy of the board.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerBoardSnapshot {
    pub generation: u64,
    pub range: Option<DateRange>,
    pub rows: Vec<PartyLedgerRow>,
    pub totals: LedgerTotals,
}

/// Outcome of one party's fetch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Loaded(PartyId),
    Failed(PartyId),
    /// Superseded by a newer load before it arrived.
    Discarded(PartyId),
}

/// Handle on the tasks started by a load. Dropping it does not cancel them.
pub struct LoadHandle {
    generation: u64,
    tasks: Vec<JoinHandle<RowOutcome>>,
}

impl LoadHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for every task of this load and collect their outcomes.
    pub async fn wait(self) -> Vec<RowOutcome> {
        join_all(self.tasks)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "Party ledger task panicked or was cancelled");
                    None
                }
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct LedgerAggregator {
    backend: Arc<dyn LedgerBackend>,
    board: Arc<RwLock<LedgerBoard>>,
}

impl LedgerAggregator {
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self {
            backend,
            board: Arc::new(RwLock::new(LedgerBoard::default())),
        }
    }

    /// Start loading every party's ledger for `range`, replacing any
    /// previous load. Rows fill in as their fetches resolve.
    pub async fn load_all(&self, parties: Vec<Party>, range: DateRange) -> LoadHandle {
        let (generation, tickets) = {
            let mut board = self.board.write().await;
            let tickets = board.begin(parties, range);
            (board.generation, tickets)
        };

        tracing::info!(
            generation,
            parties = tickets.len(),
            start_date = %range.start_date(),
            end_date = %range.end_date(),
            "Loading party ledgers"
        );

        let tasks = tickets
            .into_iter()
            .map(|(party_id, ticket)| self.spawn_fetch(party_id, ticket, range))
            .collect();

        LoadHandle { generation, tasks }
    }

    /// Reload a single row under the current filter, e.g. after a failure or
    /// after a payment was recorded for that party. Returns `None` when the
    /// party is not on the board.
    pub async fn reload_party(&self, party_id: PartyId) -> Option<LoadHandle> {
        let (generation, ticket, range) = {
            let mut board = self.board.write().await;
            let range = board.range?;
            let ticket = board.restart_row(party_id)?;
            (board.generation, ticket, range)
        };

        tracing::info!(generation, party_id, "Reloading party ledger");

        Some(LoadHandle {
            generation,
            tasks: vec![self.spawn_fetch(party_id, ticket, range)],
        })
    }

    fn spawn_fetch(&self, party_id: PartyId, ticket: u64, range: DateRange) -> JoinHandle<RowOutcome> {
        let backend = self.backend.clone();
        let board = self.board.clone();

        tokio::spawn(
            async move {
                let result = backend.get_party_ledger(party_id, range).await;
                let ok = result.is_ok();
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "Party ledger fetch failed");
                }

                let applied = board.write().await.apply(party_id, ticket, result);

                if !applied {
                    tracing::debug!("Discarding stale party ledger result");
                    metrics::record_ledger_fetch("stale");
                    RowOutcome::Discarded(party_id)
                } else if ok {
                    metrics::record_ledger_fetch("ok");
                    RowOutcome::Loaded(party_id)
                } else {
                    metrics::record_ledger_fetch("error");
                    RowOutcome::Failed(party_id)
                }
            }
            .instrument(tracing::info_span!("party_ledger_fetch", party_id, ticket)),
        )
    }

    pub async fn snapshot(&self) -> LedgerBoardSnapshot {
        let board = self.board.read().await;
        LedgerBoardSnapshot {
            generation: board.generation,
            range: board.range,
            rows: board.rows.clone(),
            totals: LedgerTotals::from_rows(&board.rows),
        }
    }

    pub async fn totals(&self) -> LedgerTotals {
        LedgerTotals::from_rows(&self.board.read().await.rows)
    }
}
