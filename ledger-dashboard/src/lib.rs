pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

use services::backend::LedgerBackend;
use services::ledger_aggregator::LedgerAggregator;
use services::payment_index::PaymentIndexes;
use services::session::LedgerSessions;
use std::sync::Arc;

/// Shared application state: the upstream client and the engine built on it.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn LedgerBackend>,
    pub indexes: Arc<PaymentIndexes>,
    pub aggregator: LedgerAggregator,
    pub sessions: Arc<LedgerSessions>,
}

impl AppState {
    pub fn new(backend: Arc<dyn LedgerBackend>, payment_page_size: u32) -> Self {
        Self {
            indexes: Arc::new(PaymentIndexes::new(backend.clone(), payment_page_size)),
            aggregator: LedgerAggregator::new(backend.clone()),
            sessions: Arc::new(LedgerSessions::new()),
            backend,
        }
    }
}
