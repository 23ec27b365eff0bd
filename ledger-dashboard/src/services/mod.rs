pub mod backend;
pub mod ledger_aggregator;
pub mod ledger_view;
pub mod metrics;
pub mod payment_index;
pub mod reconciliation;
pub mod session;
