//! Payment records as served by the payment registry.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type OrderId = i64;
pub type PaymentId = i64;

/// Physical site partitioning payments and orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Floor {
    #[serde(alias = "ground", alias = "Ground")]
    Ground,
    #[serde(alias = "first", alias = "First")]
    First,
}

impl Floor {
    pub const ALL: [Floor; 2] = [Floor::Ground, Floor::First];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ground => "GROUND",
            Self::First => "FIRST",
        }
    }
}

impl fmt::Display for Floor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Floor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GROUND" => Ok(Self::Ground),
            "FIRST" => Ok(Self::First),
            other => Err(format!("unknown floor '{}'", other)),
        }
    }
}

/// Billing track of an order: invoiced (GST) or cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    #[serde(alias = "official", alias = "Official")]
    Official,
    #[serde(alias = "offline", alias = "Offline")]
    Offline,
}

impl BillingMode {
    pub const ALL: [BillingMode; 2] = [BillingMode::Official, BillingMode::Offline];

    /// The single place where a missing mode is defaulted.
    ///
    /// Every read of a payment's mode goes through here so that index keys and
    /// lookups agree.
    pub fn normalize(mode: Option<BillingMode>) -> BillingMode {
        mode.unwrap_or(BillingMode::Official)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Official => "OFFICIAL",
            Self::Offline => "OFFLINE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Official => "Official",
            Self::Offline => "Offline",
        }
    }
}

impl fmt::Display for BillingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One payment record: the running received total for an order on one
/// billing track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    /// Raw mode as sent by the registry. Read it through [`Payment::mode`].
    #[serde(default)]
    pub billing_mode: Option<BillingMode>,
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default)]
    pub received_amount: Decimal,
    #[serde(default)]
    pub last_received_date: Option<NaiveDate>,
}

impl Payment {
    pub fn mode(&self) -> BillingMode {
        BillingMode::normalize(self.billing_mode)
    }

    pub fn key(&self) -> PaymentKey {
        PaymentKey::new(self.order_id, self.mode())
    }

    /// `total - received`, floored at zero.
    pub fn outstanding(&self) -> Decimal {
        (self.total_amount - self.received_amount).max(Decimal::ZERO)
    }
}

/// Composite lookup key into a floor's payment index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaymentKey {
    pub order_id: OrderId,
    pub mode: BillingMode,
}

impl PaymentKey {
    pub fn new(order_id: OrderId, mode: BillingMode) -> Self {
        Self { order_id, mode }
    }
}

/// Spring-style page envelope returned by the payment list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPage {
    #[serde(default)]
    pub content: Vec<Payment>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
}

impl PaymentPage {
    /// True when the registry holds more records than this page carries.
    pub fn is_truncated(&self) -> bool {
        self.total_elements > self.content.len() as u64
    }
}

/// Body of a receive-payment call: the incremental receipt, not a new total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub new_received_amount: Decimal,
    pub new_received_date: NaiveDate,
}
