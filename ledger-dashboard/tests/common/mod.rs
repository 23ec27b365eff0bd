#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use ledger_dashboard::models::{
    BillingMode, DateRange, Floor, ModeSummary, Order, Party, PartyId, PartyLedgerResponse,
    Payment, PaymentId, PaymentPage, PaymentReceipt, PaymentSummary,
};
use ledger_dashboard::services::backend::{BackendError, LedgerBackend};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// A call the engine made against the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Parties,
    Ledger(PartyId, DateRange),
    Pdf(PartyId, DateRange),
    PaymentList(Floor, u32),
    Receive(PaymentId, PaymentReceipt),
}

/// In-memory stand-in for the business API.
///
/// Ledger responses can be held back with [`FakeBackend::gate_ledger`], and
/// the next payment list with [`FakeBackend::gate_payments`], to force a
/// particular completion order.
#[derive(Default)]
pub struct FakeBackend {
    parties: Mutex<Vec<Party>>,
    ledgers: Mutex<HashMap<PartyId, Result<PartyLedgerResponse, String>>>,
    ranged_ledgers: Mutex<HashMap<(PartyId, DateRange), PartyLedgerResponse>>,
    gates: Mutex<HashMap<(PartyId, DateRange), Arc<Notify>>>,
    payments: Mutex<HashMap<Floor, Result<Vec<Payment>, String>>>,
    payment_gates: Mutex<HashMap<Floor, Arc<Notify>>>,
    receive_failure: Mutex<Option<(StatusCode, String)>>,
    pdf: Mutex<Vec<u8>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_parties(&self, parties: Vec<Party>) {
        *self.parties.lock().unwrap() = parties;
    }

    pub fn set_ledger(&self, ledger: PartyLedgerResponse) {
        self.ledgers
            .lock()
            .unwrap()
            .insert(ledger.party_id, Ok(ledger));
    }

    /// Ledger served only for one window; takes precedence over `set_ledger`.
    pub fn set_ledger_for(&self, range: DateRange, ledger: PartyLedgerResponse) {
        self.ranged_ledgers
            .lock()
            .unwrap()
            .insert((ledger.party_id, range), ledger);
    }

    pub fn fail_ledger(&self, party_id: PartyId, message: &str) {
        self.ledgers
            .lock()
            .unwrap()
            .insert(party_id, Err(message.to_string()));
    }

    /// Hold the ledger response for `(party_id, range)` until the returned
    /// gate is notified.
    pub fn gate_ledger(&self, party_id: PartyId, range: DateRange) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert((party_id, range), gate.clone());
        gate
    }

    /// Hold the next payment list for `floor` until the returned gate is
    /// notified. The page is read when the call starts, so a held response
    /// reflects the registry as it was at that moment.
    pub fn gate_payments(&self, floor: Floor) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.payment_gates
            .lock()
            .unwrap()
            .insert(floor, gate.clone());
        gate
    }

    pub fn set_payments(&self, floor: Floor, payments: Vec<Payment>) {
        self.payments.lock().unwrap().insert(floor, Ok(payments));
    }

    pub fn fail_payments(&self, floor: Floor, message: &str) {
        self.payments
            .lock()
            .unwrap()
            .insert(floor, Err(message.to_string()));
    }

    pub fn reject_receipts(&self, status: StatusCode, message: &str) {
        *self.receive_failure.lock().unwrap() = Some((status, message.to_string()));
    }

    pub fn set_pdf(&self, bytes: Vec<u8>) {
        *self.pdf.lock().unwrap() = bytes;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn receipt_calls(&self) -> usize {
        self.count(|call| matches!(call, Call::Receive(..)))
    }

    pub fn payment_list_calls(&self, floor: Floor) -> usize {
        self.count(|call| matches!(call, Call::PaymentList(f, _) if *f == floor))
    }

    pub fn ledger_calls(&self, party_id: PartyId) -> usize {
        self.count(|call| matches!(call, Call::Ledger(p, _) if *p == party_id))
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn server_error(operation: &'static str, message: &str) -> BackendError {
    BackendError::Status {
        operation,
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.to_string(),
    }
}

#[async_trait]
impl LedgerBackend for FakeBackend {
    async fn get_all_parties(&self) -> Result<Vec<Party>, BackendError> {
        self.record(Call::Parties);
        Ok(self.parties.lock().unwrap().clone())
    }

    async fn get_party_ledger(
        &self,
        party_id: PartyId,
        range: DateRange,
    ) -> Result<PartyLedgerResponse, BackendError> {
        self.record(Call::Ledger(party_id, range));

        let gate = self.gates.lock().unwrap().get(&(party_id, range)).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(ledger) = self.ranged_ledgers.lock().unwrap().get(&(party_id, range)) {
            return Ok(ledger.clone());
        }

        match self.ledgers.lock().unwrap().get(&party_id) {
            Some(Ok(ledger)) => Ok(ledger.clone()),
            Some(Err(message)) => Err(server_error("get_party_ledger", message)),
            None => Err(BackendError::Status {
                operation: "get_party_ledger",
                status: StatusCode::NOT_FOUND,
                message: format!("Party {} not found", party_id),
            }),
        }
    }

    async fn get_party_ledger_pdf(
        &self,
        party_id: PartyId,
        range: DateRange,
    ) -> Result<Vec<u8>, BackendError> {
        self.record(Call::Pdf(party_id, range));
        Ok(self.pdf.lock().unwrap().clone())
    }

    async fn get_payment_list(&self, floor: Floor, size: u32) -> Result<PaymentPage, BackendError> {
        self.record(Call::PaymentList(floor, size));

        let page = match self.payments.lock().unwrap().get(&floor) {
            Some(Ok(payments)) => Ok(PaymentPage {
                total_elements: payments.len() as u64,
                total_pages: 1,
                number: 0,
                size,
                content: payments.clone(),
            }),
            Some(Err(message)) => Err(server_error("get_payment_list", message)),
            None => Ok(PaymentPage {
                content: Vec::new(),
                total_elements: 0,
                total_pages: 0,
                number: 0,
                size,
            }),
        };

        let gate = self.payment_gates.lock().unwrap().remove(&floor);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        page
    }

    async fn receive_payment(
        &self,
        payment_id: PaymentId,
        receipt: &PaymentReceipt,
    ) -> Result<Payment, BackendError> {
        self.record(Call::Receive(payment_id, receipt.clone()));

        if let Some((status, message)) = self.receive_failure.lock().unwrap().clone() {
            return Err(BackendError::Status {
                operation: "receive_payment",
                status,
                message,
            });
        }

        let mut payments = self.payments.lock().unwrap();
        for list in payments.values_mut() {
            let Ok(list) = list else { continue };
            if let Some(payment) = list.iter_mut().find(|p| p.id == payment_id) {
                payment.received_amount += receipt.new_received_amount;
                payment.last_received_date = Some(receipt.new_received_date);
                return Ok(payment.clone());
            }
        }

        Err(BackendError::Status {
            operation: "receive_payment",
            status: StatusCode::NOT_FOUND,
            message: format!("Payment {} not found", payment_id),
        })
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn range(start: &str, end: &str) -> DateRange {
    DateRange::new(date(start), date(end)).unwrap()
}

pub fn party(id: PartyId, name: &str) -> Party {
    Party {
        id,
        name: name.to_string(),
    }
}

pub fn payment(
    id: PaymentId,
    order_id: i64,
    mode: Option<BillingMode>,
    total: i64,
    received: i64,
) -> Payment {
    Payment {
        id,
        order_id,
        billing_mode: mode,
        total_amount: Decimal::from(total),
        received_amount: Decimal::from(received),
        last_received_date: None,
    }
}

fn mode_summary(total: i64, received: i64) -> ModeSummary {
    ModeSummary {
        total_amount: Decimal::from(total),
        received_amount: Decimal::from(received),
        due_amount: Decimal::from(total - received),
    }
}

/// A ledger with a single order carrying the given per-mode totals.
pub fn ledger_with_order(
    party_id: PartyId,
    order_id: i64,
    official: (i64, i64),
    offline: Option<(i64, i64)>,
) -> PartyLedgerResponse {
    let official_summary = mode_summary(official.0, official.1);
    let offline_summary = offline.map(|(total, received)| mode_summary(total, received));

    let offline_total = offline.map(|(total, _)| total).unwrap_or(0);
    let received = official.1 + offline.map(|(_, received)| received).unwrap_or(0);
    let total = official.0 + offline_total;

    PartyLedgerResponse {
        party_id,
        party_name: format!("Party {}", party_id),
        total_official_amount: Decimal::from(official.0),
        total_offline_amount: Decimal::from(offline_total),
        total_received_amount: Decimal::from(received),
        total_remaining_amount: Decimal::from(total - received),
        orders: vec![Order {
            order_id,
            order_date: date("2024-02-10"),
            products: Vec::new(),
            bill_summary: None,
            payment_summary: PaymentSummary {
                official: Some(official_summary),
                offline: offline_summary,
            },
        }],
    }
}

/// A ledger with only top-level totals.
pub fn ledger_totals(party_id: PartyId, official: i64, offline: i64, received: i64) -> PartyLedgerResponse {
    PartyLedgerResponse {
        party_id,
        party_name: format!("Party {}", party_id),
        total_official_amount: Decimal::from(official),
        total_offline_amount: Decimal::from(offline),
        total_received_amount: Decimal::from(received),
        total_remaining_amount: Decimal::from(official + offline - received),
        orders: Vec::new(),
    }
}
