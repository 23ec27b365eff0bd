//! Party ledger as produced by the ledger provider for a date window.

use super::payment::{BillingMode, OrderId};
use super::party::PartyId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Inclusive calendar-day window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, InvalidDateRange> {
        if start_date > end_date {
            return Err(InvalidDateRange {
                start_date,
                end_date,
            });
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Query parameters in the provider's naming.
    pub fn as_query(&self) -> [(&'static str, String); 2] {
        [
            ("startDate", self.start_date.format("%Y-%m-%d").to_string()),
            ("endDate", self.end_date.format("%Y-%m-%d").to_string()),
        ]
    }
}

impl<'de> Deserialize<'de> for DateRange {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            start_date: NaiveDate,
            end_date: NaiveDate,
        }

        let raw = Raw::deserialize(deserializer)?;
        DateRange::new(raw.start_date, raw.end_date).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("start date {start_date} is after end date {end_date}")]
pub struct InvalidDateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineProduct {
    #[serde(default)]
    pub product_name: String,
    /// Weight in kilograms, when sold by weight.
    #[serde(default)]
    pub quantity_kg: Option<Decimal>,
    #[serde(default)]
    pub quantity_pieces: Option<i64>,
    #[serde(default)]
    pub market_rate: Decimal,
    #[serde(default)]
    pub rate_difference: Decimal,
    #[serde(default)]
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillSummary {
    #[serde(default)]
    pub bill_percentage: Decimal,
    #[serde(default)]
    pub amount_excluding_tax: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub bill_total: Decimal,
}

/// Totals for one billing track of one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeSummary {
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default)]
    pub received_amount: Decimal,
    #[serde(default)]
    pub due_amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentSummary {
    #[serde(rename = "OFFICIAL", alias = "official", default)]
    pub official: Option<ModeSummary>,
    #[serde(rename = "OFFLINE", alias = "offline", default)]
    pub offline: Option<ModeSummary>,
}

impl PaymentSummary {
    pub fn for_mode(&self, mode: BillingMode) -> Option<&ModeSummary> {
        match mode {
            BillingMode::Official => self.official.as_ref(),
            BillingMode::Offline => self.offline.as_ref(),
        }
    }

    /// Due on one track; a missing sub-summary means nothing is due.
    pub fn due(&self, mode: BillingMode) -> Decimal {
        self.for_mode(mode)
            .map(|s| s.due_amount.max(Decimal::ZERO))
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    pub order_date: NaiveDate,
    #[serde(default)]
    pub products: Vec<LineProduct>,
    #[serde(default)]
    pub bill_summary: Option<BillSummary>,
    #[serde(default)]
    pub payment_summary: PaymentSummary,
}

impl Order {
    /// Record-payment actions for this order, one per track with a positive due.
    pub fn due_actions(&self) -> Vec<DueAction> {
        BillingMode::ALL
            .into_iter()
            .filter_map(|mode| {
                let due = self.payment_summary.due(mode);
                (due > Decimal::ZERO).then_some(DueAction {
                    order_id: self.order_id,
                    mode,
                    due_amount: due,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyLedgerResponse {
    pub party_id: PartyId,
    #[serde(default)]
    pub party_name: String,
    #[serde(default)]
    pub total_official_amount: Decimal,
    #[serde(default)]
    pub total_offline_amount: Decimal,
    #[serde(default)]
    pub total_received_amount: Decimal,
    #[serde(default)]
    pub total_remaining_amount: Decimal,
    #[serde(default)]
    pub orders: Vec<Order>,
}

impl PartyLedgerResponse {
    pub fn due_actions(&self) -> Vec<DueAction> {
        self.orders.iter().flat_map(Order::due_actions).collect()
    }
}

/// A renderable "record payment" action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueAction {
    pub order_id: OrderId,
    pub mode: BillingMode,
    pub due_amount: Decimal,
}

impl DueAction {
    /// Button text, e.g. "Official Due: ₹5000".
    pub fn label(&self) -> String {
        format!("{} Due: ₹{}", self.mode.label(), self.due_amount.normalize())
    }
}
