//! Recording a received payment against one order and billing mode.
//!
//! The flow resolves the payment record through the floor's index, validates
//! the receipt locally, submits it, and then rebuilds the index and reloads
//! the ledger. The new amount is never merged into local state: the server
//! owns the cumulative received total.

use crate::models::{BillingMode, Floor, OrderId, PartyId, Payment, PaymentReceipt};
use crate::services::backend::{BackendError, LedgerBackend};
use crate::services::ledger_view::{LedgerState, PartyLedgerView};
use crate::services::metrics;
use crate::services::payment_index::{IndexSummary, Lookup, PaymentIndex, PaymentIndexes};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;

pub const STILL_LOADING_MESSAGE: &str =
    "Payments for this floor are still loading. Try again in a moment.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FlowState {
    Idle,
    /// The floor's payment index has not been built yet.
    Blocked { message: String },
    NotFound {
        order_id: OrderId,
        mode: BillingMode,
        message: String,
        payments_unavailable: bool,
    },
    Capturing(CaptureForm),
    /// Receipt committed; index rebuild and ledger reload are running.
    Settled { payment: Payment },
}

/// The open payment-entry form, bound to the resolved record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureForm {
    pub payment: Payment,
    pub order_id: OrderId,
    pub mode: BillingMode,
    /// Pre-filled from the record's `receivedAmount`.
    pub received_so_far: Decimal,
    pub outstanding: Decimal,
    pub error: Option<String>,
}

impl CaptureForm {
    fn open(payment: &Payment) -> Self {
        Self {
            order_id: payment.order_id,
            mode: payment.mode(),
            received_so_far: payment.received_amount,
            outstanding: payment.outstanding(),
            payment: payment.clone(),
            error: None,
        }
    }

    pub fn validate(&self, submission: &PaymentSubmission) -> Result<(), CaptureError> {
        if submission.amount <= Decimal::ZERO {
            return Err(CaptureError::NonPositive);
        }
        let outstanding = self.payment.total_amount - self.payment.received_amount;
        if submission.amount > outstanding {
            return Err(CaptureError::ExceedsOutstanding {
                amount: submission.amount,
                outstanding: outstanding.max(Decimal::ZERO),
            });
        }
        Ok(())
    }
}

/// Amount and date the user entered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaymentSubmission {
    pub amount: Decimal,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    #[error("Amount must be greater than zero")]
    NonPositive,

    #[error("Amount {amount} exceeds the outstanding balance of {outstanding}")]
    ExceedsOutstanding { amount: Decimal, outstanding: Decimal },
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("No payment form is open")]
    NotCapturing,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Payment submission did not run to completion: {0}")]
    Interrupted(#[from] JoinError),
}

/// What a successful submission left behind.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub payment: Payment,
    pub index: IndexSummary,
    pub ledger_refreshed: bool,
}

/// Reconciliation state for one party ledger on one floor.
#[derive(Debug, Clone)]
pub struct ReconciliationFlow {
    floor: Floor,
    party_id: PartyId,
    state: FlowState,
}

impl ReconciliationFlow {
    pub fn new(floor: Floor, party_id: PartyId) -> Self {
        Self {
            floor,
            party_id,
            state: FlowState::Idle,
        }
    }

    pub fn floor(&self) -> Floor {
        self.floor
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Resolve `(order_id, mode)` against the floor's index and open the form.
    ///
    /// A new request replaces whatever the flow was showing, including an
    /// unsubmitted form.
    pub fn request_payment(
        &mut self,
        index: &PaymentIndex,
        order_id: OrderId,
        mode: BillingMode,
    ) -> &FlowState {
        self.state = match index.lookup(order_id, mode) {
            Lookup::NotLoaded => {
                tracing::debug!(floor = %self.floor, order_id, "Payment index not loaded yet");
                FlowState::Blocked {
                    message: STILL_LOADING_MESSAGE.to_string(),
                }
            }
            Lookup::NotFound {
                payments_unavailable,
            } => {
                tracing::info!(
                    floor = %self.floor,
                    party_id = self.party_id,
                    order_id,
                    mode = %mode,
                    payments_unavailable,
                    "No payment record for due"
                );
                FlowState::NotFound {
                    order_id,
                    mode,
                    message: not_found_message(order_id, mode, payments_unavailable),
                    payments_unavailable,
                }
            }
            Lookup::Found(payment) => FlowState::Capturing(CaptureForm::open(payment)),
        };
        &self.state
    }

    /// Validate and submit a receipt for the open form.
    ///
    /// Validation failures and server rejections keep the form open with the
    /// error attached. On success the floor index is rebuilt and the ledger
    /// reloaded before the flow returns to idle. The rebuild runs on its own
    /// task, so it still lands if this future is dropped after the receipt
    /// has committed.
    pub async fn submit(
        &mut self,
        backend: &dyn LedgerBackend,
        indexes: &Arc<PaymentIndexes>,
        view: &mut PartyLedgerView,
        submission: PaymentSubmission,
    ) -> Result<Settlement, FlowError> {
        let (payment_id, mode) = {
            let FlowState::Capturing(form) = &mut self.state else {
                return Err(FlowError::NotCapturing);
            };
            if let Err(e) = form.validate(&submission) {
                form.error = Some(e.to_string());
                return Err(e.into());
            }
            form.error = None;
            (form.payment.id, form.mode)
        };

        let receipt = PaymentReceipt {
            new_received_amount: submission.amount,
            new_received_date: submission.date,
        };

        let payment = match backend.receive_payment(payment_id, &receipt).await {
            Ok(payment) => payment,
            Err(e) => {
                tracing::warn!(payment_id, error = %e, "Payment receipt rejected");
                metrics::record_payment_receipt(mode, "error");
                if let FlowState::Capturing(form) = &mut self.state {
                    form.error = Some(e.user_message());
                }
                return Err(e.into());
            }
        };
        metrics::record_payment_receipt(mode, "ok");

        self.state = FlowState::Settled {
            payment: payment.clone(),
        };

        let (rebuilt, ledger) = tokio::join!(indexes.spawn_rebuild(self.floor), view.refresh(backend));
        let index = match rebuilt {
            Ok(index) => index,
            Err(e) => {
                tracing::error!(floor = %self.floor, error = %e, "Payment index rebuild task failed");
                indexes.snapshot(self.floor).await
            }
        };
        let ledger_refreshed = matches!(ledger, LedgerState::Loaded(_));

        tracing::info!(
            floor = %self.floor,
            party_id = self.party_id,
            payment_id,
            index_entries = index.len(),
            ledger_refreshed,
            "Payment settled"
        );

        self.state = FlowState::Idle;

        Ok(Settlement {
            payment,
            index: index.summary(),
            ledger_refreshed,
        })
    }

    /// Close an informational state or an open form.
    ///
    /// A flow still showing `Settled` belongs to a submission whose caller
    /// went away after the receipt committed; dismissing it returns to idle.
    pub fn dismiss(&mut self) {
        self.state = FlowState::Idle;
    }

    /// Abandon the open form without submitting.
    pub fn cancel(&mut self) {
        if matches!(self.state, FlowState::Capturing(_)) {
            self.state = FlowState::Idle;
        }
    }
}

fn not_found_message(order_id: OrderId, mode: BillingMode, payments_unavailable: bool) -> String {
    if payments_unavailable {
        format!(
            "Payments could not be loaded for this floor, so no {} payment record is available for order #{}.",
            mode.label(),
            order_id
        )
    } else {
        format!(
            "No {} payment record found for order #{}. It may already be settled.",
            mode.label(),
            order_id
        )
    }
}
