pub mod app;
pub mod dashboard;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod parties;
pub mod payments;
pub mod requests;
