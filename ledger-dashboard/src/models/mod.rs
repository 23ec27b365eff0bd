pub mod ledger;
pub mod party;
pub mod payment;

pub use ledger::{
    BillSummary, DateRange, DueAction, InvalidDateRange, LineProduct, ModeSummary, Order,
    PartyLedgerResponse, PaymentSummary,
};
pub use party::{Party, PartyId};
pub use payment::{
    BillingMode, Floor, OrderId, Payment, PaymentId, PaymentKey, PaymentPage, PaymentReceipt,
};
