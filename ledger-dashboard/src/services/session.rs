//! Open party ledgers, one per `(floor, party)`, held in process memory.

use crate::models::{DateRange, DueAction, Floor, PartyId};
use crate::services::backend::LedgerBackend;
use crate::services::ledger_view::{LedgerState, PartyLedgerView};
use crate::services::payment_index::PaymentIndexes;
use crate::services::reconciliation::{
    FlowError, FlowState, PaymentSubmission, ReconciliationFlow, Settlement,
};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SessionKey = (Floor, PartyId);

/// A party ledger view together with its reconciliation flow.
#[derive(Debug)]
pub struct LedgerSession {
    pub view: PartyLedgerView,
    pub flow: ReconciliationFlow,
}

impl LedgerSession {
    pub fn new(floor: Floor, party_id: PartyId) -> Self {
        Self {
            view: PartyLedgerView::new(floor, party_id),
            flow: ReconciliationFlow::new(floor, party_id),
        }
    }

    pub fn snapshot(&self) -> LedgerSessionSnapshot {
        let due_actions = self.view.due_actions();
        let action_labels = due_actions.iter().map(DueAction::label).collect();

        LedgerSessionSnapshot {
            floor: self.view.floor(),
            party_id: self.view.party_id(),
            range: self.view.range(),
            ledger: self.view.state().clone(),
            due_actions,
            action_labels,
            flow: self.flow.state().clone(),
        }
    }
}

/// Submit a receipt for the session's open form on a separate task and wait
/// for it.
///
/// Once started, the receipt, the index rebuild and the ledger reload run to
/// completion even if the caller stops waiting. The session stays locked
/// until they have.
pub async fn submit_payment(
    session: Arc<Mutex<LedgerSession>>,
    backend: Arc<dyn LedgerBackend>,
    indexes: Arc<PaymentIndexes>,
    submission: PaymentSubmission,
) -> Result<(Settlement, LedgerSessionSnapshot), FlowError> {
    tokio::spawn(async move {
        let mut guard = session.lock().await;
        let session = &mut *guard;

        let settlement = session
            .flow
            .submit(backend.as_ref(), &indexes, &mut session.view, submission)
            .await?;
        Ok::<_, FlowError>((settlement, session.snapshot()))
    })
    .await?
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSessionSnapshot {
    pub floor: Floor,
    pub party_id: PartyId,
    pub range: Option<DateRange>,
    pub ledger: LedgerState,
    pub due_actions: Vec<DueAction>,
    pub action_labels: Vec<String>,
    pub flow: FlowState,
}

#[derive(Default)]
pub struct LedgerSessions {
    sessions: DashMap<SessionKey, Arc<Mutex<LedgerSession>>>,
}

impl LedgerSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for the key, created on first use.
    pub fn open(&self, floor: Floor, party_id: PartyId) -> Arc<Mutex<LedgerSession>> {
        self.sessions
            .entry((floor, party_id))
            .or_insert_with(|| {
                tracing::debug!(floor = %floor, party_id, "Opening ledger session");
                Arc::new(Mutex::new(LedgerSession::new(floor, party_id)))
            })
            .clone()
    }

    pub fn get(&self, floor: Floor, party_id: PartyId) -> Option<Arc<Mutex<LedgerSession>>> {
        self.sessions
            .get(&(floor, party_id))
            .map(|entry| entry.value().clone())
    }

    /// Drop a session; any fetch still in flight for it is discarded on arrival.
    pub fn close(&self, floor: Floor, party_id: PartyId) -> bool {
        self.sessions.remove(&(floor, party_id)).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_returns_same_session_for_key() {
        let sessions = LedgerSessions::new();
        let a = sessions.open(Floor::Ground, 3);
        let b = sessions.open(Floor::Ground, 3);
        let c = sessions.open(Floor::First, 3);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(sessions.len(), 2);

        assert!(sessions.close(Floor::Ground, 3));
        assert!(sessions.get(Floor::Ground, 3).is_none());
    }

    #[tokio::test]
    async fn fresh_session_snapshot_is_idle() {
        let sessions = LedgerSessions::new();
        let session = sessions.open(Floor::First, 9);
        let snapshot = session.lock().await.snapshot();

        assert_eq!(snapshot.ledger, LedgerState::Idle);
        assert_eq!(snapshot.flow, FlowState::Idle);
        assert!(snapshot.due_actions.is_empty());
    }
}
