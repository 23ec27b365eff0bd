use crate::models::{BillingMode, Floor};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static LEDGER_FETCHES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static INDEX_REBUILDS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static INDEX_ENTRIES: OnceLock<IntGaugeVec> = OnceLock::new();
pub static PAYMENT_RECEIPTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Install the HTTP metrics recorder and register dashboard metrics.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Prometheus recorder already installed"),
    }

    let registry = Registry::new();

    let ledger_fetches = IntCounterVec::new(
        Opts::new(
            "dashboard_ledger_fetches_total",
            "Party ledger fetches by outcome (ok, error, stale)",
        ),
        &["outcome"],
    )
    .expect("metric can be created");

    let index_rebuilds = IntCounterVec::new(
        Opts::new(
            "dashboard_payment_index_rebuilds_total",
            "Payment index rebuilds by floor and outcome (loaded, unavailable, stale)",
        ),
        &["floor", "status"],
    )
    .expect("metric can be created");

    let index_entries = IntGaugeVec::new(
        Opts::new(
            "dashboard_payment_index_entries",
            "Payments held by the current index of each floor",
        ),
        &["floor"],
    )
    .expect("metric can be created");

    let receipts = IntCounterVec::new(
        Opts::new(
            "dashboard_payment_receipts_total",
            "Payment receipts submitted by billing mode and outcome",
        ),
        &["mode", "outcome"],
    )
    .expect("metric can be created");

    for collector in [
        Box::new(ledger_fetches.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(index_rebuilds.clone()),
        Box::new(index_entries.clone()),
        Box::new(receipts.clone()),
    ] {
        registry
            .register(collector)
            .expect("collector can be registered");
    }

    let _ = LEDGER_FETCHES_TOTAL.set(ledger_fetches);
    let _ = INDEX_REBUILDS_TOTAL.set(index_rebuilds);
    let _ = INDEX_ENTRIES.set(index_entries);
    let _ = PAYMENT_RECEIPTS_TOTAL.set(receipts);
    let _ = REGISTRY.set(registry);
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    if let Some(registry) = REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&registry.gather(), &mut buffer).ok();
        if let Ok(custom) = String::from_utf8(buffer) {
            output.push_str(&custom);
        }
    }

    output
}

pub fn record_ledger_fetch(outcome: &str) {
    if let Some(counter) = LEDGER_FETCHES_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_index_rebuild(floor: Floor, status: &str, entries: usize) {
    if let Some(counter) = INDEX_REBUILDS_TOTAL.get() {
        counter.with_label_values(&[floor.as_str(), status]).inc();
    }
    if let Some(gauge) = INDEX_ENTRIES.get() {
        gauge
            .with_label_values(&[floor.as_str()])
            .set(entries as i64);
    }
}

pub fn record_payment_receipt(mode: BillingMode, outcome: &str) {
    if let Some(counter) = PAYMENT_RECEIPTS_TOTAL.get() {
        counter.with_label_values(&[mode.as_str(), outcome]).inc();
    }
}
