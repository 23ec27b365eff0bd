//! A single party's ledger for one floor and date window.

use crate::models::{DateRange, DueAction, Floor, PartyId, PartyLedgerResponse};
use crate::services::backend::{BackendError, LedgerBackend};
use crate::services::metrics;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum LedgerState {
    Idle,
    Loading,
    Loaded(PartyLedgerResponse),
    Failed(String),
}

/// Identifies one load. Only the ticket of the latest `begin_load` may
/// complete it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub party_id: PartyId,
    pub range: DateRange,
}

#[derive(Debug, Clone)]
pub struct PartyLedgerView {
    floor: Floor,
    party_id: PartyId,
    range: Option<DateRange>,
    generation: u64,
    state: LedgerState,
}

impl PartyLedgerView {
    pub fn new(floor: Floor, party_id: PartyId) -> Self {
        Self {
            floor,
            party_id,
            range: None,
            generation: 0,
            state: LedgerState::Idle,
        }
    }

    pub fn floor(&self) -> Floor {
        self.floor
    }

    pub fn party_id(&self) -> PartyId {
        self.party_id
    }

    pub fn range(&self) -> Option<DateRange> {
        self.range
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn ledger(&self) -> Option<&PartyLedgerResponse> {
        match &self.state {
            LedgerState::Loaded(ledger) => Some(ledger),
            _ => None,
        }
    }

    /// Switch to `range` and invalidate any load in flight.
    pub fn begin_load(&mut self, range: DateRange) -> LoadTicket {
        self.generation += 1;
        self.range = Some(range);
        self.state = LedgerState::Loading;

        LoadTicket {
            generation: self.generation,
            party_id: self.party_id,
            range,
        }
    }

    /// Reload the current window, if one has been chosen.
    pub fn begin_refresh(&mut self) -> Option<LoadTicket> {
        let range = self.range?;
        Some(self.begin_load(range))
    }

    /// Apply a fetch result. Stale tickets are ignored and reported as false.
    pub fn complete(
        &mut self,
        ticket: LoadTicket,
        result: Result<PartyLedgerResponse, BackendError>,
    ) -> bool {
        if ticket.generation != self.generation || ticket.party_id != self.party_id {
            tracing::debug!(
                party_id = self.party_id,
                ticket_generation = ticket.generation,
                current_generation = self.generation,
                "Discarding stale ledger response"
            );
            metrics::record_ledger_fetch("stale");
            return false;
        }

        self.state = match result {
            Ok(ledger) => {
                metrics::record_ledger_fetch("ok");
                LedgerState::Loaded(ledger)
            }
            Err(e) => {
                tracing::warn!(party_id = self.party_id, error = %e, "Party ledger fetch failed");
                metrics::record_ledger_fetch("error");
                LedgerState::Failed(e.user_message())
            }
        };
        true
    }

    /// Fetch and apply in one step, for callers that hold the view throughout.
    pub async fn load(&mut self, backend: &dyn LedgerBackend, range: DateRange) -> &LedgerState {
        let ticket = self.begin_load(range);
        let result = fetch(backend, ticket).await;
        self.complete(ticket, result);
        &self.state
    }

    /// Reload the current window. No-op when no window was ever loaded.
    pub async fn refresh(&mut self, backend: &dyn LedgerBackend) -> &LedgerState {
        if let Some(ticket) = self.begin_refresh() {
            let result = fetch(backend, ticket).await;
            self.complete(ticket, result);
        }
        &self.state
    }

    /// Clear a failure so the view can be retried.
    pub fn dismiss_error(&mut self) {
        if matches!(self.state, LedgerState::Failed(_)) {
            self.state = LedgerState::Idle;
        }
    }

    pub fn due_actions(&self) -> Vec<DueAction> {
        self.ledger()
            .map(PartyLedgerResponse::due_actions)
            .unwrap_or_default()
    }
}

/// Fetch the ledger a ticket asks for.
pub async fn fetch(
    backend: &dyn LedgerBackend,
    ticket: LoadTicket,
) -> Result<PartyLedgerResponse, BackendError> {
    backend.get_party_ledger(ticket.party_id, ticket.range).await
}
